use crate::error::AllocationError;
use crate::models::batch::Student;

/// First serial handed out when a batch has neither a roster nor a start roll.
pub const DEFAULT_START_SERIAL: u64 = 1001;

/// A sample roll split into its fixed prefix and trailing serial,
/// e.g. `BTCS24O1135` -> (`BTCS24O`, 1135, width 4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollTemplate {
    prefix: String,
    start: u64,
    width: usize,
}

impl RollTemplate {
    pub fn parse(sample: &str) -> Result<Self, AllocationError> {
        let sample = sample.trim();
        let digits = sample.len() - sample.trim_end_matches(|c: char| c.is_ascii_digit()).len();
        if digits == 0 {
            return Err(AllocationError::config(format!(
                "start roll {:?} does not end in a serial number",
                sample
            )));
        }
        let (prefix, serial) = sample.split_at(sample.len() - digits);
        let start = serial.parse::<u64>().map_err(|e| {
            AllocationError::config(format!("start roll {:?} has an unusable serial: {}", sample, e))
        })?;
        Ok(Self { prefix: prefix.to_string(), start, width: digits })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    /// Zero-padded to the sample's serial width.
    pub fn nth(&self, offset: u64) -> Result<String, AllocationError> {
        let serial = self.start.checked_add(offset).ok_or_else(|| {
            AllocationError::config(format!(
                "start roll serial {} cannot be advanced by {}",
                self.start, offset
            ))
        })?;
        Ok(format!("{}{:0width$}", self.prefix, serial, width = self.width))
    }
}

/// Generates placeholder rolls for batches that only declare a head count.
#[derive(Debug)]
pub struct RollSeries {
    next_serial: u64,
}

impl Default for RollSeries {
    fn default() -> Self {
        Self { next_serial: DEFAULT_START_SERIAL }
    }
}

impl RollSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// With a start roll the batch gets its own series. Without one the
    /// batch draws plain numbers from a counter shared by all such batches,
    /// so two batches never collide.
    pub fn generate(
        &mut self,
        start_roll: Option<&str>,
        count: usize,
    ) -> Result<Vec<Student>, AllocationError> {
        match start_roll.filter(|s| !s.trim().is_empty()) {
            Some(sample) => {
                let template = RollTemplate::parse(sample)?;
                (0..count as u64).map(|i| template.nth(i).map(Student::new)).collect()
            }
            None => {
                let first = self.next_serial;
                let next = u64::try_from(count)
                    .ok()
                    .and_then(|n| first.checked_add(n))
                    .ok_or_else(|| {
                        AllocationError::config(format!(
                            "cannot generate {} roll numbers from serial {}",
                            count, first
                        ))
                    })?;
                self.next_serial = next;
                Ok((first..next).map(|n| Student::new(n.to_string())).collect())
            }
        }
    }
}
