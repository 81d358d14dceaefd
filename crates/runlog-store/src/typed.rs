//! Serde adapters over the byte-oriented writer and reader.

use crate::reader::Reader;
use crate::writer::{WriteResult, Writer};
use runlog_common::{payload, LogError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

/// Encodes each value with Postcard before appending it.
pub struct TypedWriter<T> {
    inner: Writer,
    _marker: PhantomData<fn(&T)>,
}

impl<T: Serialize> TypedWriter<T> {
    pub fn new(inner: Writer) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    pub fn write(&mut self, value: &T) -> Result<WriteResult, LogError> {
        let bytes = payload::encode(value)?;
        self.inner.write(&bytes)
    }

    pub fn get_mut(&mut self) -> &mut Writer {
        &mut self.inner
    }

    pub fn into_inner(self) -> Writer {
        self.inner
    }
}

/// Decodes every scanned payload as a `T`.
pub struct TypedReader<T> {
    inner: Reader,
    /// Set once the log ends or fails in a way retrying cannot get past.
    done: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> TypedReader<T> {
    pub fn new(inner: Reader) -> Self {
        Self {
            inner,
            done: false,
            _marker: PhantomData,
        }
    }

    /// Next decoded value; `None` under the same conditions as
    /// [`Reader::scan_record`].
    pub fn read(&mut self) -> Result<Option<T>, LogError> {
        match self.inner.scan_record()? {
            Some(record) => payload::decode(&record.data).map(Some),
            None => Ok(None),
        }
    }

    pub fn get_mut(&mut self) -> &mut Reader {
        &mut self.inner
    }

    pub fn into_inner(self) -> Reader {
        self.inner
    }
}

impl<T: DeserializeOwned> Iterator for TypedReader<T> {
    type Item = Result<T, LogError>;

    /// Ends at the first `None` or at any error other than a payload that
    /// fails to decode, which leaves the cursor past that record.
    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read() {
            Ok(Some(value)) => Some(Ok(value)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = !matches!(e, LogError::Serialization(_));
                Some(Err(e))
            }
        }
    }
}

impl<T: DeserializeOwned> std::iter::FusedIterator for TypedReader<T> {}
