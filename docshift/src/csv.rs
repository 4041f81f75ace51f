//! Incremental CSV row reading.

use csv_async::{AsyncReader, AsyncReaderBuilder, StringRecord};
use tokio::io::AsyncRead;

use crate::error::TransformResult;

/// Reads a comma-separated byte stream one row at a time.
///
/// The first row is returned like any other; callers decide whether it holds field names. Rows
/// may have different widths.
pub struct CsvReader<R> {
    reader: AsyncReader<R>,
    record: StringRecord,
    rows: u64,
}

impl<R> CsvReader<R>
where
    R: AsyncRead + Unpin + Send,
{
    /// Creates a reader over `source`.
    pub fn new(source: R) -> Self {
        let reader = AsyncReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .create_reader(source);

        Self {
            reader,
            record: StringRecord::new(),
            rows: 0,
        }
    }

    /// Returns the next row, or `None` once the source is exhausted.
    pub async fn next_row(&mut self) -> TransformResult<Option<Vec<String>>> {
        if !self.reader.read_record(&mut self.record).await? {
            return Ok(None);
        }

        self.rows += 1;
        Ok(Some(self.record.iter().map(str::to_owned).collect()))
    }

    /// Returns the number of rows read so far, header included.
    pub fn rows(&self) -> u64 {
        self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn reads_rows_in_order_with_ragged_widths() {
        let source: &[u8] = b"name,age\nAda,30\nLin,\n\"Grace, Hopper\",85,extra\n";
        let mut reader = CsvReader::new(source);

        assert_eq!(reader.next_row().await.unwrap().unwrap(), vec!["name", "age"]);
        assert_eq!(reader.next_row().await.unwrap().unwrap(), vec!["Ada", "30"]);
        assert_eq!(reader.next_row().await.unwrap().unwrap(), vec!["Lin", ""]);
        assert_eq!(
            reader.next_row().await.unwrap().unwrap(),
            vec!["Grace, Hopper", "85", "extra"]
        );
        assert_eq!(reader.next_row().await.unwrap(), None);
        assert_eq!(reader.rows(), 4);
    }

    #[tokio::test]
    async fn invalid_utf8_is_a_parse_error() {
        let source: &[u8] = b"name\n\xff\xfe\n";
        let mut reader = CsvReader::new(source);

        reader.next_row().await.unwrap();
        let err = reader.next_row().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ParseError);
    }
}
