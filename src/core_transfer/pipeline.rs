// RETR/STOR/APPE: one file moved over one data connection.

use crate::core_fs::{FileSink, FileSource, WriteMode};
use crate::core_ftp::{ControlError, ControlIo, ControlSession, ReplyCode};
use crate::core_transfer::data::DataChannel;
use crate::core_transfer::error::TransferError;
use crate::core_transfer::state::{DataType, Direction, TransferPhase, TransferState};
use crate::core_transfer::throttle::speed_limit_sleep;
use crate::core_transfer::transcode::{AsciiDecoder, AsciiEncoder};
use crate::helpers::{auto_unit_speed, basename};
use crate::session::Site;
use crate::users::User;
use log::{info, warn};
use std::io::SeekFrom;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

/// How a transfer ended, once its final reply is on the wire.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub direction: Direction,
    pub phase: TransferPhase,
    pub reply: ReplyCode,
    pub bytes: u64,
    pub duration: Duration,
}

#[derive(Debug)]
struct Completed {
    bytes: u64,
    duration: Duration,
}

/// Runs a single transfer for the logged-in `user` of a control session.
///
/// Errors that only concern the transfer are answered on the control connection and the
/// call returns `Ok`. Control channel failures and cancellation come back as `Err` after the
/// data connection has been closed. The transfer slot is released before the final reply.
pub struct TransferPipeline<'a, S> {
    control: &'a mut ControlSession<S>,
    data: &'a mut DataChannel,
    user: &'a User,
    site: &'a Site,
    cancel: CancellationToken,
    phase: TransferPhase,
    state: TransferState,
}

impl<'a, S> TransferPipeline<'a, S>
where
    S: ControlIo,
{
    pub fn new(
        control: &'a mut ControlSession<S>,
        data: &'a mut DataChannel,
        user: &'a User,
        site: &'a Site,
    ) -> Self {
        let cancel = control.cancel_token().clone();
        Self {
            control,
            data,
            user,
            site,
            cancel,
            phase: TransferPhase::Idle,
            state: TransferState::new(),
        }
    }

    /// RETR `path` starting at `offset`.
    pub async fn download(
        mut self,
        path: &str,
        offset: u64,
        data_type: DataType,
    ) -> Result<TransferOutcome, ControlError> {
        let result = self.run_download(path, offset, data_type).await;
        self.finish(Direction::Download, result).await
    }

    /// STOR (or APPE when `append` is set) into `path`. A non-zero `offset` resumes an
    /// earlier upload.
    pub async fn upload(
        mut self,
        path: &str,
        offset: u64,
        data_type: DataType,
        append: bool,
    ) -> Result<TransferOutcome, ControlError> {
        let result = self.run_upload(path, offset, data_type, append).await;
        self.finish(Direction::Upload, result).await
    }

    async fn run_download(
        &mut self,
        path: &str,
        offset: u64,
        data_type: DataType,
    ) -> Result<Completed, TransferError> {
        if offset > 0 && data_type == DataType::Ascii {
            return Err(TransferError::BadCommandSequence);
        }

        let profile = self.user.profile;
        self.phase.advance(TransferPhase::SlotPending);
        let _slot = self
            .site
            .counter
            .acquire_slot(self.user.uid, Direction::Download, profile.max_sim_downloads)
            .ok_or(TransferError::SlotRefused {
                max: profile.max_sim_downloads,
                direction: Direction::Download.as_str(),
            })?;
        self.phase.advance(TransferPhase::SlotHeld);

        let mut source = self
            .site
            .store
            .open_read(path)
            .await
            .map_err(TransferError::OpenFailed)?;
        self.phase.advance(TransferPhase::SourceOpen);

        let size = source
            .seek(SeekFrom::End(0))
            .await
            .map_err(TransferError::SeekFailed)?;
        if offset > size {
            return Err(TransferError::InvalidRestParameter);
        }
        source
            .seek(SeekFrom::Start(offset))
            .await
            .map_err(TransferError::SeekFailed)?;

        let announcement = format!(
            "Opening {} connection for download of {} ({} bytes){}.",
            data_type.label(),
            basename(path),
            size,
            self.protection_note()
        );
        self.control
            .respond(ReplyCode::TransferStatusOkay, announcement)
            .await?;
        self.phase.advance(TransferPhase::Announced);

        self.data.open(Direction::Download, &self.cancel).await?;
        self.phase.advance(TransferPhase::DataOpen);

        info!(
            "{} downloading {} from offset {} ({})",
            self.user.name,
            path,
            offset,
            data_type.label()
        );
        self.stream_download(&mut source, data_type, profile.max_download_speed)
            .await?;
        drop(source);
        self.data.close().await.map_err(TransferError::DataWrite)?;
        let duration = self.state.close();

        let kilobytes = self.state.bytes() / 1024;
        self.site
            .stats
            .record_download(&self.user.name, kilobytes, duration.as_millis() as u64);
        self.site
            .credits
            .adjust_credits(&self.user.name, -(kilobytes as i64));

        Ok(Completed {
            bytes: self.state.bytes(),
            duration,
        })
    }

    async fn stream_download(
        &mut self,
        source: &mut Box<dyn FileSource>,
        data_type: DataType,
        max_speed: i64,
    ) -> Result<(), TransferError> {
        self.phase.advance(TransferPhase::Streaming);
        self.state = TransferState::new();

        let mut buffer = vec![0u8; self.site.config.server.chunk_size()];
        let mut encoded = Vec::new();
        let mut encoder = AsciiEncoder::default();

        loop {
            let read = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(TransferError::Cancelled),
                read = source.read(&mut buffer) => read,
            };
            let len = read.map_err(TransferError::DiskRead)?;
            if len == 0 {
                break;
            }
            self.state.update(len);

            let chunk = match data_type {
                DataType::Ascii => {
                    encoder.encode(&buffer[..len], &mut encoded);
                    &encoded[..]
                }
                DataType::Binary => &buffer[..len],
            };
            let written = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(TransferError::Cancelled),
                written = self.data.write_all(chunk) => written,
            };
            written.map_err(TransferError::DataWrite)?;

            if !speed_limit_sleep(&self.state, max_speed, &self.cancel).await {
                return Err(TransferError::Cancelled);
            }
        }
        Ok(())
    }

    async fn run_upload(
        &mut self,
        path: &str,
        offset: u64,
        data_type: DataType,
        append: bool,
    ) -> Result<Completed, TransferError> {
        let mode = if append {
            WriteMode::Append
        } else if offset > 0 {
            WriteMode::Resume(offset)
        } else {
            WriteMode::Truncate
        };
        if matches!(mode, WriteMode::Resume(_)) && data_type == DataType::Ascii {
            return Err(TransferError::BadCommandSequence);
        }

        let profile = self.user.profile;
        self.phase.advance(TransferPhase::SlotPending);
        let _slot = self
            .site
            .counter
            .acquire_slot(self.user.uid, Direction::Upload, profile.max_sim_uploads)
            .ok_or(TransferError::SlotRefused {
                max: profile.max_sim_uploads,
                direction: Direction::Upload.as_str(),
            })?;
        self.phase.advance(TransferPhase::SlotHeld);

        let mut sink = self
            .site
            .store
            .open_write(path, mode)
            .await
            .map_err(TransferError::OpenFailed)?;
        self.phase.advance(TransferPhase::SourceOpen);

        let size = sink
            .seek(SeekFrom::End(0))
            .await
            .map_err(TransferError::SeekFailed)?;
        if let WriteMode::Resume(offset) = mode {
            if offset > size {
                return Err(TransferError::InvalidRestParameter);
            }
            sink.seek(SeekFrom::Start(offset))
                .await
                .map_err(TransferError::SeekFailed)?;
        }

        let announcement = format!(
            "Opening {} connection for upload of {}{}.",
            data_type.label(),
            basename(path),
            self.protection_note()
        );
        self.control
            .respond(ReplyCode::TransferStatusOkay, announcement)
            .await?;
        self.phase.advance(TransferPhase::Announced);

        self.data.open(Direction::Upload, &self.cancel).await?;
        self.phase.advance(TransferPhase::DataOpen);

        info!(
            "{} uploading {} ({:?}, {})",
            self.user.name,
            path,
            mode,
            data_type.label()
        );
        self.stream_upload(&mut sink, data_type, profile.max_upload_speed)
            .await?;
        sink.flush().await.map_err(TransferError::DiskWrite)?;
        drop(sink);
        self.data.close().await.ok();
        let duration = self.state.close();

        let kilobytes = self.state.bytes() / 1024;
        self.site
            .stats
            .record_upload(&self.user.name, kilobytes, duration.as_millis() as u64);
        if profile.ratio > 0 {
            self.site.credits.adjust_credits(
                &self.user.name,
                (kilobytes * u64::from(profile.ratio)) as i64,
            );
        }

        Ok(Completed {
            bytes: self.state.bytes(),
            duration,
        })
    }

    async fn stream_upload(
        &mut self,
        sink: &mut Box<dyn FileSink>,
        data_type: DataType,
        max_speed: i64,
    ) -> Result<(), TransferError> {
        self.phase.advance(TransferPhase::Streaming);
        self.state = TransferState::new();

        let mut buffer = vec![0u8; self.site.config.server.chunk_size()];
        let mut decoded = Vec::new();
        let mut decoder = AsciiDecoder::default();

        loop {
            let read = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(TransferError::Cancelled),
                read = self.data.read(&mut buffer) => read,
            };
            let len = read.map_err(TransferError::DataRead)?;
            if len == 0 {
                break;
            }
            self.state.update(len);

            let chunk = match data_type {
                DataType::Ascii => {
                    decoder.decode(&buffer[..len], &mut decoded);
                    &decoded[..]
                }
                DataType::Binary => &buffer[..len],
            };
            let written = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(TransferError::Cancelled),
                written = sink.write_all(chunk) => written,
            };
            written.map_err(TransferError::DiskWrite)?;

            if !speed_limit_sleep(&self.state, max_speed, &self.cancel).await {
                return Err(TransferError::Cancelled);
            }
        }

        if data_type == DataType::Ascii {
            decoder.finish(&mut decoded);
            sink.write_all(&decoded)
                .await
                .map_err(TransferError::DiskWrite)?;
        }
        Ok(())
    }

    fn protection_note(&self) -> &'static str {
        if self.data.protection() {
            " using TLS/SSL"
        } else {
            ""
        }
    }

    async fn finish(
        mut self,
        direction: Direction,
        result: Result<Completed, TransferError>,
    ) -> Result<TransferOutcome, ControlError> {
        let error = match result {
            Ok(completed) => {
                self.phase.advance(TransferPhase::Completed);
                let message = format!(
                    "Transfer finished @ {}",
                    auto_unit_speed(completed.bytes, completed.duration)
                );
                self.control
                    .respond(ReplyCode::DataClosedOkay, message)
                    .await?;
                info!(
                    "{} {} of {} bytes finished",
                    self.user.name,
                    direction.as_str(),
                    completed.bytes
                );
                return Ok(TransferOutcome {
                    direction,
                    phase: self.phase,
                    reply: ReplyCode::DataClosedOkay,
                    bytes: completed.bytes,
                    duration: completed.duration,
                });
            }
            Err(error) => error,
        };

        // The source/sink and the slot are gone already; the data connection may not be.
        self.data.close().await.ok();
        if self.phase != TransferPhase::Idle {
            self.phase.advance(TransferPhase::Aborted);
        }

        let Some(code) = error.reply_code() else {
            warn!(
                "{} {} interrupted: {}",
                self.user.name,
                direction.as_str(),
                error
            );
            return Err(match error {
                TransferError::Control(e) => e,
                _ => ControlError::Cancelled,
            });
        };

        warn!(
            "{} {} failed: {}",
            self.user.name,
            direction.as_str(),
            error
        );
        self.control.respond(code, error.to_string()).await?;
        Ok(TransferOutcome {
            direction,
            phase: self.phase,
            reply: code,
            bytes: self.state.bytes(),
            duration: self.state.close(),
        })
    }
}
