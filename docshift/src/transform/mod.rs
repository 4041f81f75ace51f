//! The transformations docshift runs over a source.
//!
//! The streaming operations ([`clear_identifiers`], [`csv_to_json`]) pull one document at a time
//! from their source and push it through a [`DocumentWriter`], waiting for the target to drain
//! whenever the writer pauses. [`assign_identifiers`] reads the whole source first so that every
//! identifier request can be issued at once.

mod assign;
mod clear;
mod csv_to_json;

pub use assign::assign_identifiers;
pub use clear::clear_identifiers;
pub use csv_to_json::{csv_to_json, row_to_document};

use crate::error::TransformResult;
use crate::types::{ContainerShape, Document, WriteSummary};
use crate::writer::{DocumentWriter, FlowState};

/// Opens `writer`, waiting for the opening framing to drain if it paused.
async fn open_writer(writer: &mut DocumentWriter, shape: ContainerShape) -> TransformResult<()> {
    if writer.open(shape).await? == FlowState::Paused {
        writer.drained().await?;
    }

    Ok(())
}

/// Writes `document`, holding the caller back until the target drains if the writer paused.
async fn write_document(writer: &mut DocumentWriter, document: &Document) -> TransformResult<()> {
    if writer.write(document).await? == FlowState::Paused {
        writer.drained().await?;
    }

    Ok(())
}

/// Closes `writer` after a successful stream, or aborts it and returns the stream's error.
async fn finish(
    writer: DocumentWriter,
    streamed: TransformResult<()>,
) -> TransformResult<WriteSummary> {
    match streamed {
        Ok(()) => writer.close().await,
        Err(err) => {
            writer.abort().await;
            Err(err)
        }
    }
}
