//! Command execution against one logical unit.

use crate::bus::{Bus, DataPhase};
use crate::config::Features;
use crate::scsi::{
    backend::{Backend, Capacity},
    commands::{op_code, *},
    enums::{AdditionalSenseCode, DeviceType, PageCode, PageControl, SenseKey},
    mode_page::{ModePageError, MAX_PAGE_LEN},
    responses::*,
    sense::SenseRecord,
    unit::LogicalUnit,
    CommandError,
};

/// Dayna frame header: length, then flags
const SCSILINK_HEADER_BYTES: usize = 6;

/// Executes commands for the LUN bound to the current transaction
pub struct CommandHandler<'a, D: Backend> {
    pub unit: &'a mut LogicalUnit,
    pub backend: &'a mut D,
    pub buffer: &'a mut [u8],
    pub features: &'a Features,
    pub initiator: u8,
    /// LUNs configured on this target, for REPORT LUNS
    pub lun_mask: u8,
}

impl<'a, D: Backend> CommandHandler<'a, D> {
    /// Checks, decodes and runs `cdb`
    pub async fn dispatch<B: Bus>(
        &mut self,
        cdb: &[u8],
        data: &mut DataPhase<'_, B>,
    ) -> Result<(), CommandError> {
        let op_code = cdb.first().copied().unwrap_or(op_code::TEST_UNIT_READY);
        self.check_reservation(op_code)?;

        if op_code != op_code::INQUIRY && op_code != op_code::REQUEST_SENSE {
            if let Some(asc) = self.unit.unit_attention.take() {
                info!("unit attention {:?} for opcode {}", asc, op_code);
                return Err(self.unit.fail(SenseKey::UnitAttention, asc));
            }
        }

        let command =
            Command::decode(cdb, self.unit.device_type, self.features).map_err(|e| {
                warn!("unsupported opcode {} ({:?})", op_code, e);
                self.unit.fail_invalid_field()
            })?;
        debug!("scsi command: {:?}", command);

        self.execute(command, data).await
    }

    fn check_reservation(&mut self, op_code: u8) -> Result<(), CommandError> {
        match self.unit.reserved_by {
            Some(owner)
                if owner != self.initiator
                    && !matches!(
                        op_code,
                        op_code::INQUIRY
                            | op_code::REQUEST_SENSE
                            | op_code::RELEASE6
                            | op_code::RELEASE10
                    ) =>
            {
                Err(CommandError::Conflict)
            }
            _ => Ok(()),
        }
    }

    async fn execute<B: Bus>(
        &mut self,
        command: Command,
        data: &mut DataPhase<'_, B>,
    ) -> Result<(), CommandError> {
        match command {
            Command::TestUnitReady | Command::RezeroUnit => self.check_ready(),
            Command::RequestSense(cmd) => self.request_sense(cmd, data).await,
            Command::Inquiry(cmd) => self.inquiry(cmd, data).await,
            Command::ModeSense(cmd) => self.mode_sense(cmd, data).await,
            Command::ModeSelect(cmd) => self.mode_select(cmd, data).await,
            Command::Reserve => {
                self.unit.reserved_by = Some(self.initiator);
                Ok(())
            }
            Command::Release => {
                if self.unit.reserved_by == Some(self.initiator) {
                    self.unit.reserved_by = None;
                }
                Ok(())
            }
            Command::SendDiagnostic(cmd) => {
                data.drain(cmd.parameter_list_length.into()).await?;
                Ok(())
            }
            Command::ReportLuns(cmd) => self.report_luns(cmd, data).await,
            Command::AppleVendor => Ok(()),
            Command::SetDriveParameter => {
                // parameters are accepted and ignored
                data.drain(10).await?;
                Ok(())
            }

            Command::Read(cmd) => self.read(cmd, data).await,
            Command::Write(cmd) => self.write(cmd, data).await,
            Command::Seek(SeekCommand { lba }) => {
                self.check_ready()?;
                let capacity = self.capacity()?;
                self.check_range(&capacity, lba, 1)
            }
            Command::ReadCapacity(cmd) => self.read_capacity(cmd, data).await,
            Command::Verify(cmd) => self.verify(cmd, data).await,
            Command::SynchronizeCache(_) => {
                self.check_ready()?;
                let address = self.unit.address;
                self.backend
                    .flush(address)
                    .await
                    .map_err(|e| self.unit.fail_backend(e, 0))
            }
            Command::Format(cmd) => self.format(cmd, data).await,
            Command::ReassignBlocks => {
                // defect list header, then the list
                let mut header = [0u8; 4];
                data.receive(&mut header).await?;
                data.drain(u16::from_be_bytes([header[2], header[3]]).into())
                    .await?;
                self.check_ready()
            }
            Command::ReadDefectData(cmd) => {
                self.check_ready()?;
                // empty list in the requested format
                let header = [0, cmd.format & 0x1F, 0, 0];
                let len = header.len().min(cmd.allocation_length.into());
                data.send(&header[..len]).await?;
                Ok(())
            }
            Command::StartStopUnit(cmd) => self.start_stop_unit(cmd),
            Command::PreventAllowMediumRemoval(cmd) => {
                self.unit.prevent_removal = cmd.prevent != 0;
                Ok(())
            }
            Command::ReadToc(cmd) => self.read_toc(cmd, data).await,

            Command::Rewind => {
                self.check_ready()?;
                self.unit.tape_position = 0;
                Ok(())
            }
            Command::ReadBlockLimits => self.read_block_limits(data).await,
            Command::TapeRead(cmd) => self.tape_read(cmd, data).await,
            Command::TapeWrite(cmd) => self.tape_write(cmd, data).await,
            Command::WriteFilemarks(_) => {
                self.check_ready()?;
                let address = self.unit.address;
                self.backend
                    .flush(address)
                    .await
                    .map_err(|e| self.unit.fail_backend(e, 0))
            }
            Command::Space(cmd) => self.space(cmd),
            Command::Erase => {
                self.check_ready()?;
                self.unit.tape_position = 0;
                Ok(())
            }

            Command::ScsiLink(cmd) => self.scsilink(cmd, data).await,
        }
    }

    fn check_ready(&mut self) -> Result<(), CommandError> {
        if !self.unit.ready {
            return Err(self.unit.fail(SenseKey::NotReady, AdditionalSenseCode::NoMedia));
        }
        let address = self.unit.address;
        self.backend
            .status(address)
            .map_err(|e| self.unit.fail_backend(e, 0))
    }

    fn capacity(&mut self) -> Result<Capacity, CommandError> {
        let address = self.unit.address;
        let capacity = self
            .backend
            .capacity(address)
            .map_err(|e| self.unit.fail_backend(e, 0))?;
        let block_size = capacity.block_size as usize;
        if block_size == 0 || block_size > self.buffer.len() {
            error!("unusable block size {}", block_size);
            return Err(self.unit.fail(
                SenseKey::HardwareError,
                AdditionalSenseCode::NoAdditionalSenseInformation,
            ));
        }
        Ok(capacity)
    }

    fn check_range(&mut self, capacity: &Capacity, lba: u32, blocks: u32) -> Result<(), CommandError> {
        if lba as u64 + blocks as u64 > capacity.block_count as u64 {
            warn!("lba {} + {} beyond {}", lba, blocks, capacity.block_count);
            return Err(self.unit.fail_lba(lba));
        }
        Ok(())
    }

    /// Whole blocks that fit in the transfer buffer
    fn blocks_per_chunk(&self, capacity: &Capacity) -> u32 {
        (self.buffer.len() / capacity.block_size as usize) as u32
    }

    async fn request_sense<B: Bus>(
        &mut self,
        cmd: RequestSenseCommand,
        data: &mut DataPhase<'_, B>,
    ) -> Result<(), CommandError> {
        let sense = match self.unit.unit_attention.take() {
            Some(asc) => {
                self.unit.sense.consume_sense();
                SenseRecord::new(SenseKey::UnitAttention, asc)
            }
            None => self.unit.sense.consume_sense(),
        };
        send_sense(sense, cmd.allocation_length, data).await
    }

    async fn inquiry<B: Bus>(
        &mut self,
        cmd: InquiryCommand,
        data: &mut DataPhase<'_, B>,
    ) -> Result<(), CommandError> {
        let device_type = self.unit.device_type.peripheral_device_type();
        let allocation_length = cmd.allocation_length as usize;

        if cmd.enable_vital_product_data {
            let mut page = [0u8; 12];
            let len = match cmd.page_code {
                // supported pages
                0x00 => {
                    page[..6].copy_from_slice(&[u8::from(device_type), 0x00, 0, 2, 0x00, 0x80]);
                    6
                }
                // unit serial number
                0x80 => {
                    let address = self.unit.address;
                    page[..4].copy_from_slice(&[u8::from(device_type), 0x80, 0, 8]);
                    page[4..12].copy_from_slice(b"00000000");
                    page[10] = b'0' + address.id;
                    page[11] = b'0' + address.lun;
                    12
                }
                _ => return Err(self.unit.fail_invalid_field()),
            };
            data.send(&page[..len.min(allocation_length)]).await?;
            return Ok(());
        }
        if cmd.page_code != 0 {
            return Err(self.unit.fail_invalid_field());
        }

        let mut response = InquiryResponse::for_unit(device_type, &self.unit.identification);
        response.set_removable_medium(self.unit.removable);
        response.set_sync(self.features.synchronous);
        response.set_command_queue(self.features.tagged_queuing);
        let bytes = response.as_bytes();
        data.send(&bytes[..bytes.len().min(allocation_length)])
            .await?;
        Ok(())
    }

    async fn mode_sense<B: Bus>(
        &mut self,
        cmd: ModeSenseXCommand,
        data: &mut DataPhase<'_, B>,
    ) -> Result<(), CommandError> {
        if cmd.page_control == PageControl::SavedValues {
            return Err(self.unit.fail(
                SenseKey::IllegalRequest,
                AdditionalSenseCode::SavingParametersNotSupported,
            ));
        }
        let page_code = PageCode::try_from(cmd.page_code).map_err(|_| self.unit.fail_invalid_field())?;
        if page_code != PageCode::AllPages && self.unit.mode_pages.get_page(page_code).is_none() {
            return Err(self.unit.fail_invalid_field());
        }

        let block_descriptor = match (cmd.disable_block_descriptors, self.unit.device_type) {
            (false, device_type) if device_type.is_block_device() => {
                let address = self.unit.address;
                let capacity = self.backend.capacity(address).ok();
                Some(match capacity {
                    Some(c) => (c.block_count, c.block_size),
                    None => (0, device_type.default_block_size()),
                })
            }
            _ => None,
        };
        let header = ModeParameterHeader {
            command_length: cmd.command_length,
            medium_type: 0,
            write_protected: self.unit.device_type == DeviceType::Optical,
            block_descriptor,
        };

        let mut len = header.len();
        for page in self.unit.mode_pages.get_all_pages() {
            if page_code != PageCode::AllPages && page.code() != page_code {
                continue;
            }
            let changeable;
            let bytes = match cmd.page_control {
                PageControl::ChangeableValues => {
                    changeable = page.changeable_bytes();
                    &changeable[..page.len()]
                }
                PageControl::DefaultValues => page.default_bytes(),
                _ => page.bytes(),
            };
            self.buffer[len..len + bytes.len()].copy_from_slice(bytes);
            len += bytes.len();
        }
        header.write(self.buffer, len);

        let send_len = len.min(cmd.allocation_length.into());
        data.send(&self.buffer[..send_len]).await?;
        Ok(())
    }

    async fn mode_select<B: Bus>(
        &mut self,
        cmd: ModeSelectXCommand,
        data: &mut DataPhase<'_, B>,
    ) -> Result<(), CommandError> {
        if cmd.save_pages {
            return Err(self.unit.fail_invalid_field());
        }
        let len = cmd.parameter_list_length as usize;
        if len == 0 {
            return Ok(());
        }
        if len > self.buffer.len() {
            return Err(self.unit.fail(
                SenseKey::IllegalRequest,
                AdditionalSenseCode::ParameterListLengthError,
            ));
        }
        data.receive(&mut self.buffer[..len]).await?;
        let params = &self.buffer[..len];

        let (header_len, descriptor_len) = match cmd.command_length {
            CommandLength::C6 if len >= 4 => (4, params[3] as usize),
            CommandLength::C10 | CommandLength::C12 if len >= 8 => {
                (8, u16::from_be_bytes([params[6], params[7]]) as usize)
            }
            _ => return Err(self.unit.fail(
                SenseKey::IllegalRequest,
                AdditionalSenseCode::ParameterListLengthError,
            )),
        };

        // validate every page before touching any of them
        let start = header_len + descriptor_len;
        if start > len {
            warn!("mode select: block descriptors overrun the parameter list");
            return Err(self.unit.fail(
                SenseKey::IllegalRequest,
                AdditionalSenseCode::ParameterListLengthError,
            ));
        }
        let mut pos = start;
        while pos < len {
            let page_len = match params.get(pos + 1) {
                Some(n) => *n as usize + 2,
                None => usize::MAX,
            };
            if page_len == usize::MAX || pos + page_len > len || page_len > MAX_PAGE_LEN {
                warn!("mode select: page at {} overruns the parameter list", pos);
                return Err(self.unit.fail(
                    SenseKey::IllegalRequest,
                    AdditionalSenseCode::ParameterListLengthError,
                ));
            }
            let page = PageCode::from_page_byte(params[pos])
                .and_then(|code| self.unit.mode_pages.get_page(code));
            match page {
                None => {
                    return Err(self.unit.fail(
                        SenseKey::IllegalRequest,
                        AdditionalSenseCode::InvalidFieldInParameterList,
                    ))
                }
                Some(page) if page.len() != page_len => {
                    warn!("mode select: page {} has length {}", params[pos], page_len);
                    return Err(self.unit.fail_invalid_field());
                }
                Some(_) => {}
            }
            pos += page_len;
        }

        let mut pos = start;
        while pos < len {
            let page_len = params[pos + 1] as usize + 2;
            if let Some(code) = PageCode::from_page_byte(params[pos]) {
                if let Err(e) = self
                    .unit
                    .mode_pages
                    .set_page(code, &params[pos..pos + page_len])
                {
                    error!("mode select: page {:?} failed after validation: {:?}", code, e);
                    return Err(match e {
                        ModePageError::LengthMismatch => self.unit.fail_invalid_field(),
                        _ => self.unit.fail(
                            SenseKey::IllegalRequest,
                            AdditionalSenseCode::InvalidFieldInParameterList,
                        ),
                    });
                }
            }
            pos += page_len;
        }
        Ok(())
    }

    async fn report_luns<B: Bus>(
        &mut self,
        cmd: ReportLunsCommand,
        data: &mut DataPhase<'_, B>,
    ) -> Result<(), CommandError> {
        if cmd.allocation_length < 16 {
            return Err(self.unit.fail_invalid_field());
        }
        let mut response = [0u8; 8 + 8 * 8];
        let mut len = 8;
        for lun in 0..8u8 {
            if self.lun_mask & (1 << lun) != 0 {
                response[len + 1] = lun;
                len += 8;
            }
        }
        response[0..4].copy_from_slice(&((len - 8) as u32).to_be_bytes());
        let send_len = len.min(cmd.allocation_length as usize);
        data.send(&response[..send_len]).await?;
        Ok(())
    }

    async fn read<B: Bus>(
        &mut self,
        cmd: ReadXCommand,
        data: &mut DataPhase<'_, B>,
    ) -> Result<(), CommandError> {
        self.check_ready()?;
        let capacity = self.capacity()?;
        self.check_range(&capacity, cmd.lba, cmd.transfer_length)?;
        self.read_blocks(&capacity, cmd.lba, cmd.transfer_length, data)
            .await
    }

    /// Streams `count` blocks from `lba` as DATA IN, a buffer at a time
    async fn read_blocks<B: Bus>(
        &mut self,
        capacity: &Capacity,
        start: u32,
        count: u32,
        data: &mut DataPhase<'_, B>,
    ) -> Result<(), CommandError> {
        let block_size = capacity.block_size as usize;
        let per_chunk = self.blocks_per_chunk(capacity);
        let address = self.unit.address;
        let end = start + count;
        let mut lba = start;
        while lba < end {
            let blocks = per_chunk.min(end - lba);
            let buf = &mut self.buffer[..blocks as usize * block_size];
            if let Err(e) = self.backend.read_blocks(address, lba, buf).await {
                // the initiator still gets the bytes it was promised
                data.pad((end - lba) as usize * block_size).await?;
                return Err(self.unit.fail_backend(e, lba));
            }
            data.send(buf).await?;
            lba += blocks;
        }
        Ok(())
    }

    async fn write<B: Bus>(
        &mut self,
        cmd: WriteXCommand,
        data: &mut DataPhase<'_, B>,
    ) -> Result<(), CommandError> {
        if self.unit.device_type == DeviceType::Optical {
            return Err(self.unit.fail(SenseKey::DataProtect, AdditionalSenseCode::WriteProtected));
        }
        self.check_ready()?;
        let capacity = self.capacity()?;
        self.check_range(&capacity, cmd.lba, cmd.transfer_length)?;
        self.write_blocks(&capacity, cmd.lba, cmd.transfer_length, data)
            .await?;
        if cmd.verify {
            let address = self.unit.address;
            self.backend
                .flush(address)
                .await
                .map_err(|e| self.unit.fail_backend(e, cmd.lba))?;
        }
        Ok(())
    }

    /// Receives `count` blocks as DATA OUT and stores them from `lba`
    async fn write_blocks<B: Bus>(
        &mut self,
        capacity: &Capacity,
        start: u32,
        count: u32,
        data: &mut DataPhase<'_, B>,
    ) -> Result<(), CommandError> {
        let block_size = capacity.block_size as usize;
        let per_chunk = self.blocks_per_chunk(capacity);
        let address = self.unit.address;
        let end = start + count;
        let mut lba = start;
        while lba < end {
            let blocks = per_chunk.min(end - lba);
            let buf = &mut self.buffer[..blocks as usize * block_size];
            data.receive(buf).await?;
            if let Err(e) = self.backend.write_blocks(address, lba, buf).await {
                let remaining = (end - lba - blocks) as usize * block_size;
                data.drain(remaining).await?;
                return Err(self.unit.fail_backend(e, lba));
            }
            lba += blocks;
        }
        Ok(())
    }

    async fn verify<B: Bus>(
        &mut self,
        cmd: Verify10Command,
        data: &mut DataPhase<'_, B>,
    ) -> Result<(), CommandError> {
        self.check_ready()?;
        let capacity = self.capacity()?;
        let count = u32::from(cmd.verification_length);
        self.check_range(&capacity, cmd.lba, count)?;
        if !cmd.byte_check {
            return Ok(());
        }

        let block_size = capacity.block_size as usize;
        let address = self.unit.address;
        let mut miscompare = None;
        for lba in cmd.lba..cmd.lba + count {
            let block = &mut self.buffer[..block_size];
            if let Err(e) = self.backend.read_blocks(address, lba, block).await {
                data.drain((cmd.lba + count - lba) as usize * block_size)
                    .await?;
                return Err(self.unit.fail_backend(e, lba));
            }
            let mut chunk = [0u8; 64];
            for offset in (0..block_size).step_by(chunk.len()) {
                let n = chunk.len().min(block_size - offset);
                data.receive(&mut chunk[..n]).await?;
                if miscompare.is_none() && chunk[..n] != self.buffer[offset..offset + n] {
                    miscompare = Some(lba);
                }
            }
        }
        match miscompare {
            Some(lba) => {
                self.unit.sense.record_error_with_information(
                    SenseKey::Miscompare,
                    AdditionalSenseCode::MiscompareDuringVerify,
                    lba,
                );
                Err(CommandError::Failed)
            }
            None => Ok(()),
        }
    }

    async fn read_capacity<B: Bus>(
        &mut self,
        cmd: ReadCapacity10Command,
        data: &mut DataPhase<'_, B>,
    ) -> Result<(), CommandError> {
        if !cmd.pmi && cmd.lba != 0 {
            return Err(self.unit.fail_invalid_field());
        }
        self.check_ready()?;
        let capacity = self.capacity()?;
        let mut response = ReadCapacity10Response::new();
        response.set_max_lba(capacity.max_lba());
        response.set_block_size(capacity.block_size);
        data.send(response.as_bytes()).await?;
        Ok(())
    }

    async fn format<B: Bus>(
        &mut self,
        cmd: FormatCommand,
        data: &mut DataPhase<'_, B>,
    ) -> Result<(), CommandError> {
        if cmd.format_data {
            let mut header = [0u8; 4];
            data.receive(&mut header).await?;
            data.drain(u16::from_be_bytes([header[2], header[3]]).into())
                .await?;
        }
        self.check_ready()
    }

    fn start_stop_unit(&mut self, cmd: StartStopUnitCommand) -> Result<(), CommandError> {
        let address = self.unit.address;
        if cmd.load_eject && self.unit.removable {
            if cmd.start {
                self.backend
                    .load_eject(address, true)
                    .map_err(|e| self.unit.fail_backend(e, 0))?;
                self.unit.ready = true;
                self.unit
                    .post_unit_attention(AdditionalSenseCode::NotReadyToReadyChange);
            } else {
                if self.unit.prevent_removal {
                    return Err(self.unit.fail(
                        SenseKey::IllegalRequest,
                        AdditionalSenseCode::MediumRemovalPrevented,
                    ));
                }
                self.backend
                    .load_eject(address, false)
                    .map_err(|e| self.unit.fail_backend(e, 0))?;
                self.unit.ready = false;
            }
            return Ok(());
        }
        self.unit.ready = cmd.start;
        Ok(())
    }

    async fn read_toc<B: Bus>(
        &mut self,
        cmd: ReadTocCommand,
        data: &mut DataPhase<'_, B>,
    ) -> Result<(), CommandError> {
        self.check_ready()?;
        let capacity = self.capacity()?;
        let address = |lba: u32| -> [u8; 4] {
            if cmd.msf {
                msf_address(lba)
            } else {
                lba.to_be_bytes()
            }
        };

        let mut response = [0u8; 20];
        let len = match cmd.format {
            // table of contents: one data track and the lead-out
            0 => {
                if cmd.starting_track > 1 && cmd.starting_track != 0xAA {
                    return Err(self.unit.fail_invalid_field());
                }
                response[2] = 1;
                response[3] = 1;
                let mut pos = 4;
                if cmd.starting_track <= 1 {
                    response[pos + 1] = 0x14;
                    response[pos + 2] = 1;
                    response[pos + 4..pos + 8].copy_from_slice(&address(0));
                    pos += 8;
                }
                response[pos + 1] = 0x14;
                response[pos + 2] = 0xAA;
                response[pos + 4..pos + 8].copy_from_slice(&address(capacity.block_count));
                pos + 8
            }
            // session info
            1 => {
                response[2] = 1;
                response[3] = 1;
                response[5] = 0x14;
                response[6] = 1;
                response[8..12].copy_from_slice(&address(0));
                12
            }
            _ => return Err(self.unit.fail_invalid_field()),
        };
        response[0..2].copy_from_slice(&((len - 2) as u16).to_be_bytes());
        let send_len = len.min(cmd.allocation_length.into());
        data.send(&response[..send_len]).await?;
        Ok(())
    }

    async fn read_block_limits<B: Bus>(
        &mut self,
        data: &mut DataPhase<'_, B>,
    ) -> Result<(), CommandError> {
        self.check_ready()?;
        let capacity = self.capacity()?;
        let size = capacity.block_size.to_be_bytes();
        // fixed block size only: maximum == minimum
        let response = [0, size[1], size[2], size[3], size[2], size[3]];
        data.send(&response).await?;
        Ok(())
    }

    async fn tape_read<B: Bus>(
        &mut self,
        cmd: TapeTransferCommand,
        data: &mut DataPhase<'_, B>,
    ) -> Result<(), CommandError> {
        if !cmd.fixed {
            return Err(self.unit.fail_invalid_field());
        }
        self.check_ready()?;
        let capacity = self.capacity()?;
        let position = self.unit.tape_position;
        if position as u64 + cmd.transfer_length as u64 > capacity.block_count as u64 {
            self.unit.sense.record_error_with_information(
                SenseKey::BlankCheck,
                AdditionalSenseCode::NoAdditionalSenseInformation,
                cmd.transfer_length,
            );
            return Err(CommandError::Failed);
        }
        self.read_blocks(&capacity, position, cmd.transfer_length, data)
            .await?;
        self.unit.tape_position += cmd.transfer_length;
        Ok(())
    }

    async fn tape_write<B: Bus>(
        &mut self,
        cmd: TapeTransferCommand,
        data: &mut DataPhase<'_, B>,
    ) -> Result<(), CommandError> {
        if !cmd.fixed {
            return Err(self.unit.fail_invalid_field());
        }
        self.check_ready()?;
        let capacity = self.capacity()?;
        let position = self.unit.tape_position;
        if position as u64 + cmd.transfer_length as u64 > capacity.block_count as u64 {
            return Err(self.unit.fail(SenseKey::MediumError, AdditionalSenseCode::WriteError));
        }
        self.write_blocks(&capacity, position, cmd.transfer_length, data)
            .await?;
        self.unit.tape_position += cmd.transfer_length;
        Ok(())
    }

    fn space(&mut self, cmd: SpaceCommand) -> Result<(), CommandError> {
        self.check_ready()?;
        let capacity = self.capacity()?;
        match cmd.code {
            SpaceCode::Blocks => {
                let target = self.unit.tape_position as i64 + cmd.count as i64;
                if target < 0 || target > capacity.block_count as i64 {
                    return Err(self.unit.fail(
                        SenseKey::BlankCheck,
                        AdditionalSenseCode::NoAdditionalSenseInformation,
                    ));
                }
                self.unit.tape_position = target as u32;
                Ok(())
            }
            SpaceCode::EndOfData => {
                self.unit.tape_position = capacity.block_count;
                Ok(())
            }
            SpaceCode::Filemarks | SpaceCode::Other(_) => Err(self.unit.fail_invalid_field()),
        }
    }

    async fn scsilink<B: Bus>(
        &mut self,
        cmd: ScsiLinkCommand,
        data: &mut DataPhase<'_, B>,
    ) -> Result<(), CommandError> {
        let address = self.unit.address;
        match cmd {
            ScsiLinkCommand::Receive { allocation_length } => {
                let mut len = 0;
                if self.unit.link.enabled {
                    let frame = &mut self.buffer[SCSILINK_HEADER_BYTES..];
                    len = self
                        .backend
                        .receive_frame(address, frame)
                        .await
                        .map_err(|e| self.unit.fail_backend(e, 0))?;
                    if len > 0 {
                        self.unit.link.frames_received += 1;
                    }
                }
                self.buffer[..SCSILINK_HEADER_BYTES].fill(0);
                self.buffer[0..2].copy_from_slice(&(len as u16).to_be_bytes());
                let total = (SCSILINK_HEADER_BYTES + len).min(allocation_length.into());
                data.send(&self.buffer[..total]).await?;
                Ok(())
            }
            ScsiLinkCommand::Send { length } => {
                let len = length as usize;
                if len > self.buffer.len() {
                    data.drain(len).await?;
                    self.unit.link.frames_lost += 1;
                    return Err(self.unit.fail(
                        SenseKey::IllegalRequest,
                        AdditionalSenseCode::ParameterListLengthError,
                    ));
                }
                let frame = &mut self.buffer[..len];
                data.receive(frame).await?;
                self.backend
                    .send_frame(address, frame)
                    .await
                    .map_err(|e| self.unit.fail_backend(e, 0))?;
                self.unit.link.frames_sent += 1;
                Ok(())
            }
            ScsiLinkCommand::Stats { allocation_length } => {
                let link = self.unit.link;
                let mut stats = [0u8; 18];
                stats[0..6].copy_from_slice(&link.mac_address);
                stats[6..10].copy_from_slice(&link.frames_received.to_be_bytes());
                stats[10..14].copy_from_slice(&link.frames_sent.to_be_bytes());
                stats[14..18].copy_from_slice(&link.frames_lost.to_be_bytes());
                data.send(&stats[..stats.len().min(allocation_length.into())])
                    .await?;
                Ok(())
            }
            ScsiLinkCommand::Set { parameter_length }
            | ScsiLinkCommand::SetMode { parameter_length } => {
                data.drain(parameter_length.into()).await?;
                Ok(())
            }
            ScsiLinkCommand::Enable { enable } => {
                info!("scsilink {}: link enabled {}", address.id, enable);
                self.unit.link.enabled = enable;
                Ok(())
            }
            ScsiLinkCommand::SetMac { parameter_length } => {
                let len = parameter_length as usize;
                if len < 6 {
                    data.drain(len).await?;
                    return Err(self.unit.fail(
                        SenseKey::IllegalRequest,
                        AdditionalSenseCode::ParameterListLengthError,
                    ));
                }
                let mut mac = [0u8; 6];
                data.receive(&mut mac).await?;
                data.drain(len - 6).await?;
                self.unit.link.mac_address = mac;
                Ok(())
            }
        }
    }
}

/// Minute/second/frame form of `lba`, including the two second pregap.
/// Minutes saturate at 255
fn msf_address(lba: u32) -> [u8; 4] {
    let frames = u64::from(lba) + 150;
    [
        0,
        (frames / (75 * 60)).min(0xFF) as u8,
        ((frames / 75) % 60) as u8,
        (frames % 75) as u8,
    ]
}

async fn send_sense<B: Bus>(
    sense: SenseRecord,
    allocation_length: u8,
    data: &mut DataPhase<'_, B>,
) -> Result<(), CommandError> {
    let response = RequestSenseResponse::from(sense);
    let bytes = response.as_bytes();
    let len = match allocation_length {
        0 => RequestSenseResponse::SHORT_BYTES,
        n => bytes.len().min(n.into()),
    };
    data.send(&bytes[..len]).await?;
    Ok(())
}

/// Answers a command addressed to a LUN that is not configured.
///
/// INQUIRY reports peripheral qualifier 011b and REQUEST SENSE reports
/// LOGICAL UNIT NOT SUPPORTED; everything else fails.
pub async fn respond_without_unit<B: Bus>(
    cdb: &[u8],
    data: &mut DataPhase<'_, B>,
) -> Result<(), CommandError> {
    match cdb.first().copied() {
        Some(op_code::INQUIRY) => {
            let cmd: InquiryCommand =
                checked_extract(cdb).map_err(|_| CommandError::Failed)?;
            let response = InquiryResponse::not_present();
            let bytes = response.as_bytes();
            let len = bytes.len().min(cmd.allocation_length.into());
            data.send(&bytes[..len]).await?;
            Ok(())
        }
        Some(op_code::REQUEST_SENSE) => {
            let cmd: RequestSenseCommand =
                checked_extract(cdb).map_err(|_| CommandError::Failed)?;
            let sense = SenseRecord::new(
                SenseKey::IllegalRequest,
                AdditionalSenseCode::LogicalUnitNotSupported,
            );
            send_sense(sense, cmd.allocation_length, data).await
        }
        _ => Err(CommandError::Failed),
    }
}
