//! Annex B byte-stream helpers: NAL unit iteration and access unit grouping.
//!
//! Recorded elementary streams carry parameter sets inline; the transport of a live camera
//! delivers them out of band. These helpers let a recorded stream be replayed the way a
//! device would deliver it.

pub const NAL_TYPE_SLICE: u8 = 1;
pub const NAL_TYPE_IDR: u8 = 5;
pub const NAL_TYPE_SEI: u8 = 6;
pub const NAL_TYPE_SPS: u8 = 7;
pub const NAL_TYPE_PPS: u8 = 8;
pub const NAL_TYPE_AUD: u8 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NalUnit<'a> {
    pub nal_type: u8,
    /// Header byte onwards.
    pub data: &'a [u8],
    /// The same unit preceded by its start code.
    pub with_start_code: &'a [u8],
}

impl<'a> NalUnit<'a> {
    pub fn is_parameter_set(&self) -> bool {
        self.nal_type == NAL_TYPE_SPS || self.nal_type == NAL_TYPE_PPS
    }

    pub fn is_slice(&self) -> bool {
        (NAL_TYPE_SLICE..=NAL_TYPE_IDR).contains(&self.nal_type)
    }

    pub fn is_keyframe(&self) -> bool {
        self.nal_type == NAL_TYPE_IDR
    }

    /// `first_mb_in_slice == 0`, i.e. the slice opens a new picture. The field is the first
    /// ue(v) after the header, and a leading `1` bit encodes zero.
    pub fn starts_picture(&self) -> bool {
        self.is_slice() && self.data.get(1).map_or(false, |byte| byte & 0x80 != 0)
    }
}

/// Returns the position and length (3 or 4) of the first start code at or after `from`.
fn find_start_code(data: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut i = from;
    while i + 3 <= data.len() {
        if data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 1 {
            if i > from && data[i - 1] == 0 {
                return Some((i - 1, 4));
            }
            return Some((i, 3));
        }
        i += 1;
    }
    None
}

pub struct NalUnits<'a> {
    data: &'a [u8],
    next: Option<(usize, usize)>,
}

pub fn nal_units(data: &[u8]) -> NalUnits<'_> {
    NalUnits {
        data,
        next: find_start_code(data, 0),
    }
}

impl<'a> Iterator for NalUnits<'a> {
    type Item = NalUnit<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (start, code_len) = self.next?;
            let payload_start = start + code_len;

            self.next = find_start_code(self.data, payload_start);
            let end = self.next.map_or(self.data.len(), |(next, _)| next);

            // Back-to-back start codes leave nothing in between.
            if payload_start >= end {
                continue;
            }

            let data = &self.data[payload_start..end];
            return Some(NalUnit {
                nal_type: data[0] & 0x1F,
                data,
                with_start_code: &self.data[start..end],
            });
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessUnit<'a> {
    pub nal_units: Vec<NalUnit<'a>>,
}

impl<'a> AccessUnit<'a> {
    pub fn is_keyframe(&self) -> bool {
        self.nal_units.iter().any(NalUnit::is_keyframe)
    }

    pub fn has_picture(&self) -> bool {
        self.nal_units.iter().any(NalUnit::is_slice)
    }

    /// Last SPS and PPS carried by this unit, start codes included.
    pub fn parameter_sets(&self) -> (Option<&'a [u8]>, Option<&'a [u8]>) {
        let find = |nal_type: u8| {
            self.nal_units
                .iter()
                .rev()
                .find(|nal| nal.nal_type == nal_type)
                .map(|nal| nal.with_start_code)
        };

        (find(NAL_TYPE_SPS), find(NAL_TYPE_PPS))
    }

    /// The unit as an Annex B buffer without its parameter sets.
    pub fn frame_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        for nal in self.nal_units.iter().filter(|nal| !nal.is_parameter_set()) {
            bytes.extend_from_slice(nal.with_start_code);
        }
        bytes
    }
}

pub fn access_units(data: &[u8]) -> Vec<AccessUnit<'_>> {
    let mut units = Vec::new();
    let mut current = AccessUnit::default();

    for nal in nal_units(data) {
        let opens_unit = match nal.nal_type {
            NAL_TYPE_AUD | NAL_TYPE_SPS | NAL_TYPE_PPS | NAL_TYPE_SEI => true,
            _ => nal.starts_picture(),
        };

        if opens_unit && current.has_picture() {
            units.push(std::mem::take(&mut current));
        }

        current.nal_units.push(nal);
    }

    if !current.nal_units.is_empty() {
        units.push(current);
    }

    units
}

#[cfg(test)]
mod tests {
    use super::{access_units, nal_units, NAL_TYPE_IDR, NAL_TYPE_PPS, NAL_TYPE_SLICE, NAL_TYPE_SPS};

    fn stream() -> Vec<u8> {
        let mut stream = Vec::new();
        stream.extend_from_slice(&[0, 0, 0, 1, 0x67, 0x42, 0x00, 0x1E]);
        stream.extend_from_slice(&[0, 0, 0, 1, 0x68, 0xCE, 0x3C, 0x80]);
        stream.extend_from_slice(&[0, 0, 1, 0x65, 0x88, 0x84, 0x10]);
        stream.extend_from_slice(&[0, 0, 0, 1, 0x41, 0x9A, 0x02]);
        stream.extend_from_slice(&[0, 0, 1, 0x41, 0x9A, 0x04]);
        stream
    }

    #[test]
    fn nal_units_test() {
        let data = stream();
        let types: Vec<u8> = nal_units(&data).map(|nal| nal.nal_type).collect();

        assert_eq!(
            types,
            vec![NAL_TYPE_SPS, NAL_TYPE_PPS, NAL_TYPE_IDR, NAL_TYPE_SLICE, NAL_TYPE_SLICE]
        );

        let sps = nal_units(&data).next().unwrap();
        assert_eq!(sps.data, &[0x67, 0x42, 0x00, 0x1E]);
        assert_eq!(sps.with_start_code, &[0, 0, 0, 1, 0x67, 0x42, 0x00, 0x1E]);
    }

    #[test]
    fn no_start_code_test() {
        assert_eq!(nal_units(&[0x65, 0x88, 0x84]).count(), 0);
        assert_eq!(nal_units(&[0, 0, 1]).count(), 0);
    }

    #[test]
    fn access_units_test() {
        let data = stream();
        let units = access_units(&data);

        assert_eq!(units.len(), 3);
        assert!(units[0].is_keyframe());
        assert!(!units[1].is_keyframe());

        let (sps, pps) = units[0].parameter_sets();
        assert_eq!(sps.unwrap()[4], 0x67);
        assert_eq!(pps.unwrap()[4], 0x68);
        assert_eq!(units[1].parameter_sets(), (None, None));

        assert_eq!(units[0].frame_bytes(), vec![0, 0, 1, 0x65, 0x88, 0x84, 0x10]);
    }
}
