use crate::scsi::enums::{AdditionalSenseCode, SenseKey, Status};

/// The outstanding error condition of a logical unit
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SenseRecord {
    pub key: SenseKey,
    pub asc: AdditionalSenseCode,
    /// Reported in the INFORMATION field with the VALID bit set
    pub information: Option<u32>,
}

impl SenseRecord {
    pub fn new(key: SenseKey, asc: AdditionalSenseCode) -> Self {
        Self {
            key,
            asc,
            information: None,
        }
    }

    pub fn is_none(&self) -> bool {
        self.key == SenseKey::NoSense && self.asc == AdditionalSenseCode::NoAdditionalSenseInformation
    }
}

/// Sense and status store, one per logical unit.
///
/// Last error wins. Only REQUEST SENSE clears.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
pub struct SenseState {
    sense: SenseRecord,
    status: Status,
}

impl SenseState {
    pub fn record_error(&mut self, key: SenseKey, asc: AdditionalSenseCode) {
        self.record(SenseRecord::new(key, asc));
    }

    pub fn record_error_with_information(
        &mut self,
        key: SenseKey,
        asc: AdditionalSenseCode,
        information: u32,
    ) {
        self.record(SenseRecord {
            key,
            asc,
            information: Some(information),
        });
    }

    fn record(&mut self, sense: SenseRecord) {
        info!("sense: set to {:?}, {:?}", sense.key, sense.asc);
        self.sense = sense;
        self.status = Status::CheckCondition;
    }

    /// Returns the current sense and resets it to NO SENSE
    pub fn consume_sense(&mut self) -> SenseRecord {
        core::mem::take(&mut self.sense)
    }

    pub fn peek(&self) -> &SenseRecord {
        &self.sense
    }

    pub fn peek_status(&self) -> Status {
        self.status
    }

    pub fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[test]
fn test_last_error_wins_and_consume_resets() {
    let mut state = SenseState::default();
    state.record_error(SenseKey::NotReady, AdditionalSenseCode::NoMedia);
    state.record_error_with_information(
        SenseKey::IllegalRequest,
        AdditionalSenseCode::InvalidLba,
        0x1234,
    );
    assert_eq!(state.peek_status(), Status::CheckCondition);
    assert_eq!(state.peek().information, Some(0x1234));

    let sense = state.consume_sense();
    assert_eq!(sense.key, SenseKey::IllegalRequest);
    assert_eq!(sense.asc, AdditionalSenseCode::InvalidLba);
    assert!(state.peek().is_none());
    assert!(state.consume_sense().is_none());
}
