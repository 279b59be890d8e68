//! Line-oriented loader for `;`-separated extracts.

use std::io::Read;

use csv::{ReaderBuilder, StringRecord};
use tracing::trace;

use crate::consumer::RecordConsumer;
use crate::error::LoadError;

/// How a delimited source is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelimitedOptions {
    pub delimiter: u8,
    /// `None` accepts any field count.
    pub field_count: Option<usize>,
    /// Drop the first record (a header line).
    pub skip_first_line: bool,
}

impl Default for DelimitedOptions {
    fn default() -> Self {
        Self {
            delimiter: b';',
            field_count: None,
            skip_first_line: false,
        }
    }
}

/// Reads every record of `input` into `consumer`, then finalizes it.
///
/// A record whose field count differs from `options.field_count` fails the
/// whole load; nothing consumed so far is returned.
///
/// # Errors
///
/// Returns [`LoadError::Format`] if the input cannot be read as delimited
/// text or a record has the wrong number of fields, and propagates whatever
/// error the consumer raises for a record.
pub fn load_delimited<R, C>(
    input: R,
    mut consumer: C,
    options: DelimitedOptions,
) -> Result<Vec<C::Record>, LoadError>
where
    R: Read,
    C: RecordConsumer,
{
    let mut reader = ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(input);

    let mut record = StringRecord::new();
    let mut index: u64 = 0;
    while reader.read_record(&mut record)? {
        let current = index;
        index += 1;
        if current == 0 && options.skip_first_line {
            trace!("Skipping header record");
            continue;
        }
        if let Some(expected) = options.field_count {
            if record.len() != expected {
                return Err(LoadError::Format {
                    record: current,
                    message: format!("expected {expected} fields, found {}", record.len()),
                });
            }
        }
        consumer.consume(&record, current)?;
    }

    Ok(consumer.finalize())
}
