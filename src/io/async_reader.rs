//! Asynchronous CSV reader with batch interface
//!
//! Provides batched, streaming deserialization of CSV rows using csv-async.
//! Rows that fail to parse are logged and skipped.

use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;
use serde::de::DeserializeOwned;
use tracing::warn;

pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self { csv_reader }
    }

    /// Read up to `batch_size` rows, converting each with `convert`
    ///
    /// Returns an empty vector when the end of the input is reached.
    pub async fn read_batch<T, U, F>(&mut self, batch_size: usize, convert: F) -> Vec<U>
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) -> Result<U, String>,
    {
        let mut batch = Vec::with_capacity(batch_size);
        let mut records = self.csv_reader.deserialize::<T>();

        while batch.len() < batch_size {
            match records.next().await {
                Some(Ok(record)) => match convert(record) {
                    Ok(converted) => batch.push(converted),
                    Err(e) => warn!(error = %e, "Record conversion error"),
                },
                Some(Err(e)) => warn!(error = %e, "CSV parse error"),
                None => break,
            }
        }

        batch
    }

    /// Read every remaining row
    pub async fn read_all<T, U, F>(&mut self, convert: F) -> Vec<U>
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) -> Result<U, String>,
    {
        let mut all = Vec::new();
        loop {
            let batch = self.read_batch(1000, &convert).await;
            if batch.is_empty() {
                break;
            }
            all.extend(batch);
        }
        all
    }
}
