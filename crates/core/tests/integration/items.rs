use anyhow::Result;
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::json;

use sharevault_core::{
    Category, CollisionPolicy, RestoreCollection, RestoreHandlers, RestoreOptions,
    item::{Contact, Event, Page},
    version,
};
use sharevault_testing::{InMemoryCollection, InMemoryItems};

use crate::{opts, restore};

fn ada() -> Contact {
    Contact {
        given_name: Some("Ada".to_string()),
        surname: Some("Lovelace".to_string()),
        email_addresses: vec!["ada@example.com".to_string()],
        ..Contact::default()
    }
}

#[rstest]
fn existing_contacts_are_skipped(opts: RestoreOptions) -> Result<()> {
    let contacts = InMemoryItems::<Contact>::new();
    _ = contacts.add_existing("u1", "Restored", ada());

    let collections: Vec<Box<dyn RestoreCollection>> = vec![
        Box::new(
            InMemoryCollection::new("t/exchange/u1/contacts/friends")?
                .with_json(
                    "c1",
                    &json!({
                        "kind": "contact",
                        "givenName": "Ada",
                        "surname": "Lovelace",
                        "emailAddresses": ["ADA@example.com"],
                    }),
                )
                .with_json(
                    "c2",
                    &json!({
                        "kind": "contact",
                        "givenName": "Charles",
                        "surname": "Babbage",
                        "jobTitle": "Engineer",
                    }),
                ),
        ),
        Box::new(
            InMemoryCollection::new("t/exchange/u1/contacts/work")?
                .with_json("c3", &json!({ "kind": "contact", "givenName": "Grace" })),
        ),
    ];

    let outcome = restore(
        &opts,
        RestoreHandlers {
            contacts: Some(&contacts),
            ..RestoreHandlers::default()
        },
        version::BACKUP,
        collections,
        None,
    );
    outcome.result?;

    // one container for all collections of the owner
    assert_eq!(contacts.container_lookups(), 1);

    assert_eq!(outcome.status.metrics.objects, 3);
    assert_eq!(outcome.status.metrics.successes, 2);
    assert_eq!(outcome.faults.recovered().len(), 1);
    assert!(outcome.faults.recovered()[0].is_conflict());

    let stored = contacts.items();
    assert_eq!(stored.len(), 3);
    assert!(stored.iter().all(|item| item.container == stored[0].container));
    let babbage = &stored[1].item;
    assert_eq!(babbage.extra["jobTitle"], json!("Engineer"));

    let names: Vec<_> = outcome.details.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["Charles Babbage", "Grace"]);
    assert!(outcome.details.iter().all(|d| d.category == Category::Contacts));
    assert_eq!(
        outcome.details[0].repo_ref,
        "t/exchange/u1/contacts/friends/c2"
    );
    Ok(())
}

#[test]
fn contacts_go_back_to_their_folders_without_location() -> Result<()> {
    let contacts = InMemoryItems::<Contact>::new();

    let collections: Vec<Box<dyn RestoreCollection>> = vec![
        Box::new(
            InMemoryCollection::new("t/exchange/u1/contacts/friends")?
                .with_json("c1", &json!({ "kind": "contact", "givenName": "Ada" })),
        ),
        Box::new(
            InMemoryCollection::new("t/exchange/u1/contacts/work")?
                .with_json("c2", &json!({ "kind": "contact", "givenName": "Grace" })),
        ),
    ];

    let outcome = restore(
        &RestoreOptions::default(),
        RestoreHandlers {
            contacts: Some(&contacts),
            ..RestoreHandlers::default()
        },
        version::BACKUP,
        collections,
        None,
    );
    outcome.result?;

    assert_eq!(contacts.container_lookups(), 2);
    let friends = contacts.container_id("u1", "friends").unwrap();
    let work = contacts.container_id("u1", "work").unwrap();
    assert_ne!(friends, work);
    assert!(contacts.container_id("u1", "").is_none());

    let containers: Vec<_> = contacts
        .items()
        .into_iter()
        .map(|stored| stored.container)
        .collect();
    assert_eq!(containers, vec![friends, work]);

    let locations: Vec<_> = outcome
        .details
        .iter()
        .map(|d| d.location_ref.as_str())
        .collect();
    assert_eq!(locations, vec!["friends", "work"]);
    Ok(())
}

#[rstest]
fn events_are_copied_on_collision(opts: RestoreOptions) -> Result<()> {
    let events = InMemoryItems::<Event>::new();
    let opts = opts.on_collision(CollisionPolicy::Copy);

    let standup = json!({
        "kind": "event",
        "subject": "Standup",
        "start": { "dateTime": "2024-05-01T10:00:00.0000000", "timeZone": "UTC" },
        "end": { "dateTime": "2024-05-01T10:15:00.0000000", "timeZone": "UTC" },
    });
    let collections: Vec<Box<dyn RestoreCollection>> = vec![Box::new(
        InMemoryCollection::new("t/exchange/u1/events/cal")?
            .with_json("e1", &standup)
            .with_json("e2", &standup),
    )];

    let outcome = restore(
        &opts,
        RestoreHandlers {
            events: Some(&events),
            ..RestoreHandlers::default()
        },
        version::BACKUP,
        collections,
        None,
    );
    outcome.result?;

    assert_eq!(events.items().len(), 2);
    assert_eq!(outcome.status.metrics.successes, 2);
    assert!(!outcome.faults.has_errors());
    Ok(())
}

#[rstest]
fn wrong_kind_fails_the_item(opts: RestoreOptions) -> Result<()> {
    let pages = InMemoryItems::<Page>::new();

    let collections: Vec<Box<dyn RestoreCollection>> = vec![Box::new(
        InMemoryCollection::new("t/sharepoint/s1/pages/p")?
            .with_json("p1", &json!({ "kind": "page", "name": "Home.aspx" }))
            .with_json("p2", &json!({ "kind": "event", "subject": "Standup" }))
            .with_json("p3", &json!({ "kind": "page", "title": "No name" })),
    )];

    let outcome = restore(
        &opts,
        RestoreHandlers {
            pages: Some(&pages),
            ..RestoreHandlers::default()
        },
        version::BACKUP,
        collections,
        None,
    );
    outcome.result?;

    let names: Vec<_> = pages
        .items()
        .into_iter()
        .map(|stored| stored.item.name.unwrap_or_default())
        .collect();
    assert_eq!(names, vec!["Restored_Home.aspx", "Restored_p3"]);
    assert_eq!(outcome.status.metrics.objects, 3);
    assert_eq!(outcome.faults.recovered().len(), 1);
    Ok(())
}
