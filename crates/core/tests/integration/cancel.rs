use anyhow::Result;
use pretty_assertions::assert_eq;
use rstest::rstest;

use sharevault_core::{CancelToken, RestoreCollection, RestoreHandlers, RestoreOptions};
use sharevault_testing::{InMemoryCollection, InMemoryDrive};

use crate::{DRIVE, opts, restore};

#[rstest]
fn cancelled_restore_keeps_partial_metrics(opts: RestoreOptions) -> Result<()> {
    let cancel = CancelToken::new();
    let token = cancel.clone();
    let drive = InMemoryDrive::new("d").with_post_hook(move |_| token.cancel());

    let collections: Vec<Box<dyn RestoreCollection>> = vec![
        Box::new(
            InMemoryCollection::new(&format!("{DRIVE}/docs"))?
                .with_item("a.txt", "a")
                .with_item("b.txt", "b")
                .with_item("c.txt", "c"),
        ),
        Box::new(InMemoryCollection::new(&format!("{DRIVE}/more"))?.with_item("d.txt", "d")),
    ];

    let outcome = restore(
        &opts,
        RestoreHandlers {
            drive: Some(&drive),
            ..RestoreHandlers::default()
        },
        0,
        collections,
        Some(cancel),
    );

    assert!(outcome.result.unwrap_err().is_cancelled());
    assert!(!outcome.faults.has_errors());

    // the upload in flight completes, nothing after it is started
    assert_eq!(drive.list("Restored/docs"), vec!["a.txt"]);
    assert_eq!(outcome.status.folders, 1);
    assert_eq!(outcome.status.metrics.objects, 1);
    assert_eq!(outcome.status.metrics.successes, 1);
    assert_eq!(outcome.details.len(), 1);
    Ok(())
}

#[rstest]
fn cancelled_before_start_restores_nothing(opts: RestoreOptions) -> Result<()> {
    let cancel = CancelToken::new();
    cancel.cancel();
    let drive = InMemoryDrive::new("d");

    let collections: Vec<Box<dyn RestoreCollection>> = vec![Box::new(
        InMemoryCollection::new(&format!("{DRIVE}/docs"))?.with_item("a.txt", "a"),
    )];

    let outcome = restore(
        &opts,
        RestoreHandlers {
            drive: Some(&drive),
            ..RestoreHandlers::default()
        },
        0,
        collections,
        Some(cancel),
    );

    assert!(outcome.result.unwrap_err().is_cancelled());
    assert_eq!(outcome.status.folders, 0);
    assert!(drive.calls().is_empty());
    Ok(())
}
