use log::{debug, warn};

use crate::error::{ParameterError, ParameterRecord};

/// Latest SPS/PPS pair received from the device, waiting to be fed to the decoder.
#[derive(Debug, Clone)]
pub struct ParameterStore {
    blob: Vec<u8>,
    pending: bool,
    max_record_size: usize,
}

impl ParameterStore {
    pub fn new(max_record_size: usize) -> Self {
        Self {
            blob: Vec::new(),
            pending: false,
            max_record_size,
        }
    }

    /// Validates both records and stages their concatenation. On any failure nothing is
    /// staged, including what an earlier call left behind.
    pub fn stage(&mut self, sps: Option<&[u8]>, pps: Option<&[u8]>) -> Result<usize, ParameterError> {
        let limit = self.max_record_size;
        let records = validate(ParameterRecord::Sps, sps, limit)
            .and_then(|sps| validate(ParameterRecord::Pps, pps, limit).map(|pps| (sps, pps)));

        match records {
            Ok((sps, pps)) => {
                self.blob.clear();
                self.blob.extend_from_slice(sps);
                self.blob.extend_from_slice(pps);
                self.pending = true;

                debug!(
                    "Staged codec parameters (SPS: {} bytes, PPS: {} bytes)",
                    sps.len(),
                    pps.len()
                );

                Ok(self.blob.len())
            }
            Err(error) => {
                warn!("Discarding codec parameters: {}", error);
                self.clear();
                Err(error)
            }
        }
    }

    /// The staged blob, if it has not been consumed yet.
    pub fn pending(&self) -> Option<&[u8]> {
        if self.pending && !self.blob.is_empty() {
            Some(self.blob.as_slice())
        } else {
            None
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending().is_some()
    }

    pub fn mark_consumed(&mut self) {
        self.pending = false;
    }

    pub fn clear(&mut self) {
        self.blob.clear();
        self.pending = false;
    }

    pub fn staged_len(&self) -> usize {
        self.blob.len()
    }

    pub fn max_record_size(&self) -> usize {
        self.max_record_size
    }
}

fn validate(
    record: ParameterRecord,
    data: Option<&[u8]>,
    limit: usize,
) -> Result<&[u8], ParameterError> {
    let data = data.ok_or(ParameterError::Missing(record))?;

    if data.is_empty() {
        return Err(ParameterError::Empty(record));
    }

    if data.len() >= limit {
        return Err(ParameterError::Oversized {
            record,
            size: data.len(),
            limit,
        });
    }

    Ok(data)
}
