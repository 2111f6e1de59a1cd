use crate::config::Features;
use crate::scsi::{
    commands::{op_code::*, *},
    enums::DeviceType,
    Error,
};

/// A fully parsed and validated SCSI command
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /* all device types */
    TestUnitReady,
    RequestSense(RequestSenseCommand),
    Inquiry(InquiryCommand),
    ModeSelect(ModeSelectXCommand),
    ModeSense(ModeSenseXCommand),
    Reserve,
    Release,
    SendDiagnostic(SendDiagnosticCommand),
    ReportLuns(ReportLunsCommand),
    /// Apple vendor command 0xEE
    AppleVendor,
    /// SASI SET DRIVE PARAMETER
    SetDriveParameter,

    /* direct access and CD-ROM */
    RezeroUnit,
    Format(FormatCommand),
    ReassignBlocks,
    Read(ReadXCommand),
    Write(WriteXCommand),
    Seek(SeekCommand),
    ReadCapacity(ReadCapacity10Command),
    Verify(Verify10Command),
    SynchronizeCache(SynchronizeCache10Command),
    ReadDefectData(ReadDefectDataCommand),
    StartStopUnit(StartStopUnitCommand),
    PreventAllowMediumRemoval(PreventAllowMediumRemovalCommand),
    ReadToc(ReadTocCommand),

    /* sequential access */
    Rewind,
    ReadBlockLimits,
    TapeRead(TapeTransferCommand),
    TapeWrite(TapeTransferCommand),
    WriteFilemarks(WriteFilemarksCommand),
    Space(SpaceCommand),
    Erase,

    /* Dayna SCSI/Link */
    ScsiLink(ScsiLinkCommand),
}

impl Command {
    /// Decodes `cdb` for a unit of `device_type`.
    ///
    /// The same opcode can mean different things for different device classes
    /// so the lookup is keyed on both.
    pub fn decode(
        cdb: &[u8],
        device_type: DeviceType,
        features: &Features,
    ) -> Result<Command, Error> {
        let op_code = *cdb.first().ok_or(Error::InsufficientDataForCommand)?;
        if cdb.len() < CommandLength::for_opcode(op_code).bytes() {
            return Err(Error::InsufficientDataForCommand);
        }

        if let Some(command) = Self::decode_common(op_code, cdb, features)? {
            return Ok(command);
        }
        match device_type {
            DeviceType::Disk => Self::decode_disk(op_code, cdb),
            DeviceType::Optical => Self::decode_optical(op_code, cdb),
            DeviceType::Tape => Self::decode_tape(op_code, cdb),
            DeviceType::Ethernet => Self::decode_scsilink(op_code, cdb),
        }
    }

    fn decode_common(
        op_code: u8,
        cdb: &[u8],
        features: &Features,
    ) -> Result<Option<Command>, Error> {
        Ok(Some(match op_code {
            TEST_UNIT_READY => Command::TestUnitReady,
            REQUEST_SENSE => Command::RequestSense(checked_extract(cdb)?),
            INQUIRY => Command::Inquiry(checked_extract(cdb)?),
            MODE_SELECT6 => {
                Command::ModeSelect(checked_extract::<ModeSelect6Command>(cdb)?.into())
            }
            MODE_SELECT10 => {
                Command::ModeSelect(checked_extract::<ModeSelect10Command>(cdb)?.into())
            }
            MODE_SENSE6 => Command::ModeSense(checked_extract::<ModeSense6Command>(cdb)?.into()),
            MODE_SENSE10 => {
                Command::ModeSense(checked_extract::<ModeSense10Command>(cdb)?.into())
            }
            RESERVE6 | RESERVE10 => Command::Reserve,
            RELEASE6 | RELEASE10 => Command::Release,
            SEND_DIAGNOSTIC => Command::SendDiagnostic(checked_extract(cdb)?),
            REPORT_LUNS => Command::ReportLuns(checked_extract(cdb)?),
            MAC_UNKNOWN if features.support_apple => Command::AppleVendor,
            SET_DRIVE_PARAMETER if features.support_sasi => Command::SetDriveParameter,
            _ => return Ok(None),
        }))
    }

    fn decode_disk(op_code: u8, cdb: &[u8]) -> Result<Command, Error> {
        match op_code {
            REZERO_UNIT => Ok(Command::RezeroUnit),
            FORMAT_UNIT | FORMAT_UNIT_ALT => Ok(Command::Format(checked_extract(cdb)?)),
            REASSIGN_BLOCKS => Ok(Command::ReassignBlocks),
            READ6 => Ok(Command::Read(checked_extract::<Read6Command>(cdb)?.into())),
            READ10 => Ok(Command::Read(checked_extract::<Read10Command>(cdb)?.into())),
            WRITE6 => Ok(Command::Write(checked_extract::<Write6Command>(cdb)?.into())),
            WRITE10 => Ok(Command::Write(checked_extract::<Write10Command>(cdb)?.into())),
            WRITE_AND_VERIFY10 => Ok(Command::Write(
                checked_extract::<WriteAndVerify10Command>(cdb)?.into(),
            )),
            SEEK6 => Ok(Command::Seek(checked_extract::<Seek6Command>(cdb)?.into())),
            SEEK10 => Ok(Command::Seek(checked_extract::<Seek10Command>(cdb)?.into())),
            READ_CAPACITY10 => Ok(Command::ReadCapacity(checked_extract(cdb)?)),
            VERIFY10 => Ok(Command::Verify(checked_extract(cdb)?)),
            SYNCHRONIZE_CACHE10 => Ok(Command::SynchronizeCache(checked_extract(cdb)?)),
            READ_DEFECT_DATA => Ok(Command::ReadDefectData(checked_extract(cdb)?)),
            START_STOP_UNIT => Ok(Command::StartStopUnit(checked_extract(cdb)?)),
            PREVENT_REMOVAL => Ok(Command::PreventAllowMediumRemoval(checked_extract(cdb)?)),
            _ => Err(Error::UnhandledOpCode),
        }
    }

    fn decode_optical(op_code: u8, cdb: &[u8]) -> Result<Command, Error> {
        match op_code {
            REZERO_UNIT => Ok(Command::RezeroUnit),
            READ6 => Ok(Command::Read(checked_extract::<Read6Command>(cdb)?.into())),
            READ10 => Ok(Command::Read(checked_extract::<Read10Command>(cdb)?.into())),
            // decoded so they can be refused as write protected
            WRITE6 => Ok(Command::Write(checked_extract::<Write6Command>(cdb)?.into())),
            WRITE10 => Ok(Command::Write(checked_extract::<Write10Command>(cdb)?.into())),
            SEEK6 => Ok(Command::Seek(checked_extract::<Seek6Command>(cdb)?.into())),
            SEEK10 => Ok(Command::Seek(checked_extract::<Seek10Command>(cdb)?.into())),
            READ_CAPACITY10 => Ok(Command::ReadCapacity(checked_extract(cdb)?)),
            READ_TOC => Ok(Command::ReadToc(checked_extract::<ReadToc10Command>(cdb)?.into())),
            START_STOP_UNIT => Ok(Command::StartStopUnit(checked_extract(cdb)?)),
            PREVENT_REMOVAL => Ok(Command::PreventAllowMediumRemoval(checked_extract(cdb)?)),
            _ => Err(Error::UnhandledOpCode),
        }
    }

    fn decode_tape(op_code: u8, cdb: &[u8]) -> Result<Command, Error> {
        match op_code {
            REWIND => Ok(Command::Rewind),
            READ_BLOCK_LIMITS => Ok(Command::ReadBlockLimits),
            READ6 => Ok(Command::TapeRead(checked_extract(cdb)?)),
            WRITE6 => Ok(Command::TapeWrite(checked_extract(cdb)?)),
            WRITE_FILEMARKS => Ok(Command::WriteFilemarks(checked_extract(cdb)?)),
            SPACE => Ok(Command::Space(checked_extract::<Space6Command>(cdb)?.into())),
            ERASE => Ok(Command::Erase),
            _ => Err(Error::UnhandledOpCode),
        }
    }

    fn decode_scsilink(op_code: u8, cdb: &[u8]) -> Result<Command, Error> {
        match op_code {
            SCSILINK_RECEIVE | SCSILINK_SEND | SCSILINK_STATS | SCSILINK_SET
            | SCSILINK_ENABLE | SCSILINK_SETMAC | SCSILINK_SETMODE => {
                Ok(Command::ScsiLink(
                    checked_extract::<ScsiLink6Command>(cdb)?.into(),
                ))
            }
            _ => Err(Error::UnhandledOpCode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_meaning_depends_on_device_type() {
        let features = Features::default();
        let cdb = [0x08, 0, 0, 0, 1, 0];
        assert!(matches!(
            Command::decode(&cdb, DeviceType::Disk, &features),
            Ok(Command::Read(ReadXCommand { lba: 0, transfer_length: 1 }))
        ));
        assert!(matches!(
            Command::decode(&cdb, DeviceType::Tape, &features),
            Ok(Command::TapeRead(_))
        ));
        assert!(matches!(
            Command::decode(&cdb, DeviceType::Ethernet, &features),
            Ok(Command::ScsiLink(ScsiLinkCommand::Receive { .. }))
        ));

        let cdb = [0x01, 0, 0, 0, 0, 0];
        assert_eq!(
            Command::decode(&cdb, DeviceType::Disk, &features),
            Ok(Command::RezeroUnit)
        );
        assert_eq!(
            Command::decode(&cdb, DeviceType::Tape, &features),
            Ok(Command::Rewind)
        );
    }

    #[test]
    fn test_unhandled_and_short() {
        let features = Features::default();
        assert_eq!(
            Command::decode(&[0x43, 0, 0, 0, 0, 0, 0, 0, 0, 0], DeviceType::Disk, &features),
            Err(Error::UnhandledOpCode)
        );
        assert_eq!(
            Command::decode(&[0x28, 0, 0, 0], DeviceType::Disk, &features),
            Err(Error::InsufficientDataForCommand)
        );
        assert_eq!(
            Command::decode(&[], DeviceType::Disk, &features),
            Err(Error::InsufficientDataForCommand)
        );
    }

    #[test]
    fn test_vendor_commands_follow_features() {
        let mut features = Features::default();
        let cdb = [0xC2, 0, 0, 0, 10, 0];
        assert_eq!(
            Command::decode(&cdb, DeviceType::Disk, &features),
            Err(Error::UnhandledOpCode)
        );
        features.support_sasi = true;
        assert_eq!(
            Command::decode(&cdb, DeviceType::Disk, &features),
            Ok(Command::SetDriveParameter)
        );
        features.support_apple = false;
        assert_eq!(
            Command::decode(&[0xEE, 0, 0, 0, 0, 0], DeviceType::Disk, &features),
            Err(Error::UnhandledOpCode)
        );
    }
}
