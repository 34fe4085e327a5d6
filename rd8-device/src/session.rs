//! Device session: identity handshake and settings roundtrips
//!
//! One `DeviceSession` owns the protocol state for one RD-8. The device has
//! no request IDs, so a settings reply can only be matched by its type. The
//! session therefore allows a single outstanding settings roundtrip and
//! rejects overlapping ones with [`DeviceError::Busy`] instead of queueing.
//!
//! ```text
//! Idle ──detect──> AwaitingIdentity ──firmware reply──> Identified
//!                                                          │  ^
//!                                     settings request ────┘  │ reply / timeout / cancel
//!                                                          v  │
//!                                              AwaitingSettingsReply
//! ```
//!
//! Locks are never held across an await; completions run after the lock is
//! released so a callback may call back into the session.

use std::sync::Arc;

use parking_lot::Mutex;
use rd8_sysex::framing::{msg, parse_firmware_reply, MAX_DEVICE_ID};
use rd8_sysex::settings::names;
use rd8_sysex::{
    classify, identity_request, DataFile, DataKind, DeviceIdentity, GlobalSettings, MessageId,
    PatternData, SettingValue, SysexError, SysexMessage,
};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::channel::MidiChannel;
use crate::config::SessionConfig;
use crate::error::DeviceError;
use crate::io::{DebouncedSender, MidiIo};

/// Where the session is in its handshake / roundtrip cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingIdentity,
    Identified,
    AwaitingSettingsReply,
}

/// What `handle_message` did with an inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Firmware reply; the identity is now known
    Identified(DeviceIdentity),
    /// Settings dump; `matched` if it completed an outstanding roundtrip
    Settings { matched: bool },
    /// Not for us, or nothing to do
    Ignored,
}

type SettingsResult = Result<GlobalSettings, DeviceError>;
type SettingsCallback = Box<dyn FnOnce(SettingsResult) + Send>;

/// What to do once the settings reply arrives
enum SettingsOperation {
    /// Post-handshake read; the cache update is all that is needed
    RefreshChannels,
    Callback(SettingsCallback),
    Waiter(oneshot::Sender<SettingsResult>),
}

struct Roundtrip {
    seq: u64,
    deadline: Instant,
    op: SettingsOperation,
    /// Completes the op with `Timeout` at the deadline
    timer: Option<JoinHandle<()>>,
}

impl Roundtrip {
    fn is_live(&self, now: Instant) -> bool {
        now < self.deadline
    }

    fn finish(mut self, result: SettingsResult) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        complete(self.op, result);
    }
}

#[derive(Default)]
struct SessionInner {
    awaiting_identity: bool,
    identity: Option<DeviceIdentity>,
    roundtrip: Option<Roundtrip>,
    next_seq: u64,
    settings: Option<GlobalSettings>,
    active_pattern: Option<PatternData>,
    input_channel: Option<MidiChannel>,
    output_channel: Option<MidiChannel>,
}

impl SessionInner {
    /// Replace the cached settings and the channels derived from them
    fn apply_settings(&mut self, settings: GlobalSettings) {
        self.input_channel = channel_setting(&settings, names::MIDI_RX_CHANNEL);
        self.output_channel = channel_setting(&settings, names::MIDI_TX_CHANNEL);
        self.settings = Some(settings);
    }
}

fn channel_setting(settings: &GlobalSettings, name: &str) -> Option<MidiChannel> {
    let channel = settings
        .peek(name)
        .map_err(DeviceError::from)
        .and_then(MidiChannel::from_code);
    match channel {
        Ok(channel) => Some(channel),
        Err(e) => {
            warn!("{}: {}", name, e);
            None
        }
    }
}

/// Protocol state for one RD-8
pub struct DeviceSession {
    io: Arc<dyn MidiIo>,
    config: SessionConfig,
    debounced: DebouncedSender,
    inner: Arc<Mutex<SessionInner>>,
}

impl DeviceSession {
    /// Create a session talking through `io`
    pub fn new(io: Arc<dyn MidiIo>, config: SessionConfig) -> Self {
        Self {
            debounced: DebouncedSender::new(Arc::clone(&io)),
            io,
            config,
            inner: Arc::new(Mutex::new(SessionInner::default())),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        let inner = self.inner.lock();
        let now = Instant::now();
        if inner.roundtrip.as_ref().is_some_and(|rt| rt.is_live(now)) {
            SessionState::AwaitingSettingsReply
        } else if inner.identity.is_some() {
            SessionState::Identified
        } else if inner.awaiting_identity {
            SessionState::AwaitingIdentity
        } else {
            SessionState::Idle
        }
    }

    /// Identity from the last firmware reply
    pub fn identity(&self) -> Option<DeviceIdentity> {
        self.inner.lock().identity
    }

    // =========================================================================
    // Handshake
    // =========================================================================

    /// Send an identity request to one candidate device address (0-15)
    pub async fn detect(&self, device_id: u8) -> Result<(), DeviceError> {
        if device_id > MAX_DEVICE_ID {
            return Err(DeviceError::InvalidParameter(format!(
                "device ID {} out of range 0-{}",
                device_id, MAX_DEVICE_ID
            )));
        }
        self.inner.lock().awaiting_identity = true;
        self.io.enable_input().await?;
        self.send(&[identity_request(device_id)]).await
    }

    /// Broadcast identity requests to every address and wait the detect
    /// period for a reply to come in through `handle_message`.
    pub async fn detect_all(&self) -> Result<Option<DeviceIdentity>, DeviceError> {
        self.inner.lock().awaiting_identity = true;
        self.io.enable_input().await?;
        let requests: Vec<SysexMessage> = (0..=MAX_DEVICE_ID).map(identity_request).collect();
        self.send(&requests).await?;
        tokio::time::sleep(self.config.detect_sleep()).await;
        Ok(self.identity())
    }

    /// Feed one inbound sysex message into the session.
    ///
    /// A firmware reply sets the identity and immediately starts a settings
    /// read to learn the current MIDI channels. A settings dump refreshes the
    /// cache and completes the outstanding roundtrip, if any.
    pub async fn handle_message(&self, message: &SysexMessage) -> MessageOutcome {
        let data = message.data();
        let id = classify(data);

        if id == MessageId::new(msg::FIRMWARE, msg::REPLY) {
            return match parse_firmware_reply(data) {
                Ok(identity) => {
                    self.on_identity(identity).await;
                    MessageOutcome::Identified(identity)
                }
                Err(e) => {
                    warn!("Ignoring firmware reply: {}", e);
                    MessageOutcome::Ignored
                }
            };
        }

        if DataKind::GlobalSettings.is_data_dump(data) {
            return self.on_settings_dump(message);
        }

        if id.is_ours() {
            debug!("Ignoring {} message", id.name());
        }
        MessageOutcome::Ignored
    }

    async fn on_identity(&self, identity: DeviceIdentity) {
        {
            let mut inner = self.inner.lock();
            inner.awaiting_identity = false;
            inner.identity = Some(identity);
        }
        info!(
            "Found RD-8 with device ID {} (firmware {})",
            identity.device_id, identity.version
        );
        if let Err(e) = self
            .start_roundtrip(SettingsOperation::RefreshChannels)
            .await
        {
            warn!("Could not read MIDI channels from device: {}", e);
        }
    }

    fn on_settings_dump(&self, message: &SysexMessage) -> MessageOutcome {
        let decoded: SettingsResult = DataFile::from_message(DataKind::GlobalSettings, message)
            .and_then(|file| {
                file.into_settings().ok_or(SysexError::NoDataDump {
                    kind: DataKind::GlobalSettings,
                    count: 1,
                })
            })
            .map_err(DeviceError::from);

        let now = Instant::now();
        let roundtrip = {
            let mut inner = self.inner.lock();
            if let Ok(settings) = &decoded {
                inner.apply_settings(settings.clone());
            }
            inner.roundtrip.take()
        };

        match roundtrip {
            Some(rt) if rt.is_live(now) => {
                debug!("Settings reply matched roundtrip {}", rt.seq);
                rt.finish(decoded);
                MessageOutcome::Settings { matched: true }
            }
            expired => {
                // A reply after the deadline belongs to nobody
                if let Some(rt) = expired {
                    warn!("Settings roundtrip {} timed out", rt.seq);
                    rt.finish(Err(DeviceError::Timeout));
                }
                match decoded {
                    Ok(_) => debug!("Unsolicited settings dump"),
                    Err(e) => warn!("Unsolicited settings dump failed to decode: {}", e),
                }
                MessageOutcome::Settings { matched: false }
            }
        }
    }

    // =========================================================================
    // Settings roundtrip
    // =========================================================================

    /// Register `op` as the single outstanding roundtrip and send the request.
    ///
    /// An earlier roundtrip past its deadline is expired first; a live one
    /// makes this fail with `Busy` and stays untouched.
    async fn start_roundtrip(&self, op: SettingsOperation) -> Result<(u64, Instant), DeviceError> {
        let now = Instant::now();
        let (seq, deadline, request, expired) = {
            let mut inner = self.inner.lock();
            let identity = inner.identity.ok_or(DeviceError::NotIdentified)?;
            if inner.roundtrip.as_ref().is_some_and(|rt| rt.is_live(now)) {
                debug!("Settings request rejected, roundtrip still pending");
                return Err(DeviceError::Busy);
            }
            let request = DataKind::GlobalSettings.request(&identity, 0)?;
            let expired = inner.roundtrip.take();
            let seq = inner.next_seq;
            inner.next_seq += 1;
            let deadline = now + self.config.reply_timeout();
            let timer = self.arm_deadline(seq, deadline);
            inner.roundtrip = Some(Roundtrip {
                seq,
                deadline,
                op,
                timer,
            });
            (seq, deadline, request, expired)
        };

        if let Some(rt) = expired {
            warn!("Settings roundtrip {} timed out", rt.seq);
            rt.finish(Err(DeviceError::Timeout));
        }

        if let Err(e) = self.send(&[request]).await {
            // Nothing went out, so no reply will come
            self.release(seq);
            return Err(e);
        }
        debug!("Settings roundtrip {} started", seq);
        Ok((seq, deadline))
    }

    /// Spawn the task that expires roundtrip `seq` at `deadline`.
    ///
    /// Without a runtime the roundtrip still expires, just lazily: on the next
    /// request or the next settings dump.
    fn arm_deadline(&self, seq: u64, deadline: Instant) -> Option<JoinHandle<()>> {
        let runtime = Handle::try_current().ok()?;
        let inner = Arc::clone(&self.inner);
        Some(runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let expired = take_roundtrip(&mut inner.lock(), seq);
            if let Some(rt) = expired {
                warn!("Settings roundtrip {} timed out", rt.seq);
                complete(rt.op, Err(DeviceError::Timeout));
            }
        }))
    }

    /// Drop roundtrip `seq` if it is still the outstanding one
    fn release(&self, seq: u64) -> bool {
        let released = take_roundtrip(&mut self.inner.lock(), seq);
        match released {
            Some(mut rt) => {
                if let Some(timer) = rt.timer.take() {
                    timer.abort();
                }
                true
            }
            None => false,
        }
    }

    /// Request the settings dump and return a handle to await the reply
    pub async fn request_settings(&self) -> Result<PendingSettings<'_>, DeviceError> {
        let (tx, rx) = oneshot::channel();
        let (seq, deadline) = self.start_roundtrip(SettingsOperation::Waiter(tx)).await?;
        Ok(PendingSettings {
            session: self,
            seq,
            deadline,
            rx,
        })
    }

    /// Read the current settings from the device
    pub async fn read_settings(&self) -> Result<GlobalSettings, DeviceError> {
        self.request_settings().await?.wait().await
    }

    /// Read the settings and hand the result to `callback`.
    ///
    /// Once this returns `Ok`, `callback` runs exactly once: with the settings,
    /// or with `Timeout`/`Cancelled`. On `Err` it is never called.
    pub async fn with_global_settings<F>(&self, callback: F) -> Result<(), DeviceError>
    where
        F: FnOnce(SettingsResult) + Send + 'static,
    {
        self.start_roundtrip(SettingsOperation::Callback(Box::new(callback)))
            .await
            .map(|_| ())
    }

    /// Give up on the outstanding roundtrip, if any
    pub fn cancel_pending(&self) -> bool {
        let roundtrip = self.inner.lock().roundtrip.take();
        match roundtrip {
            Some(rt) => {
                info!("Settings roundtrip {} cancelled", rt.seq);
                rt.finish(Err(DeviceError::Cancelled));
                true
            }
            None => false,
        }
    }

    /// Cancel everything and forget the device
    pub fn reset(&self) {
        self.debounced.cancel();
        let roundtrip = {
            let mut inner = self.inner.lock();
            let next_seq = inner.next_seq;
            let roundtrip = inner.roundtrip.take();
            *inner = SessionInner {
                next_seq,
                ..SessionInner::default()
            };
            roundtrip
        };
        if let Some(rt) = roundtrip {
            rt.finish(Err(DeviceError::Cancelled));
        }
        info!("Session reset");
    }

    // =========================================================================
    // MIDI channels
    // =========================================================================

    /// Receive channel as last read from the device
    pub fn input_channel(&self) -> Option<MidiChannel> {
        self.inner.lock().input_channel
    }

    /// Transmit channel as last read from the device
    pub fn output_channel(&self) -> Option<MidiChannel> {
        self.inner.lock().output_channel
    }

    pub async fn change_input_channel(&self, channel: MidiChannel) -> Result<(), DeviceError> {
        self.change_channel(names::MIDI_RX_CHANNEL, channel).await
    }

    pub async fn change_output_channel(&self, channel: MidiChannel) -> Result<(), DeviceError> {
        self.change_channel(names::MIDI_TX_CHANNEL, channel).await
    }

    /// Read, patch one channel setting, write the whole block back.
    ///
    /// The device does not acknowledge the write; the cache is updated as
    /// soon as the block has been sent.
    async fn change_channel(
        &self,
        name: &'static str,
        channel: MidiChannel,
    ) -> Result<(), DeviceError> {
        let code = channel.checked_code()?;
        let mut settings = self.read_settings().await?;
        let identity = self.identity().ok_or(DeviceError::NotIdentified)?;
        settings.poke(name, code)?;

        let message = DataFile::GlobalSettings(settings.clone()).encode(&identity);
        self.send(&[message]).await?;
        info!("{} set to {}", name, channel);
        self.inner.lock().apply_settings(settings);
        Ok(())
    }

    // =========================================================================
    // Settings edits
    // =========================================================================

    /// Change one setting in the cached block and schedule a debounced
    /// write-back of the whole block.
    pub fn write_setting_debounced(&self, name: &str, value: u8) -> Result<(), DeviceError> {
        let mut inner = self.inner.lock();
        let identity = inner.identity.ok_or(DeviceError::NotIdentified)?;
        let mut settings = inner.settings.clone().ok_or(DeviceError::NoSettings)?;
        settings.poke(name, value)?;

        let message = DataFile::GlobalSettings(settings.clone()).encode(&identity);
        self.debounced
            .schedule(vec![message], self.config.debounce())?;
        inner.apply_settings(settings);
        Ok(())
    }

    /// Named settings with their current values, from the last settings dump
    pub fn properties(&self) -> Vec<SettingValue> {
        self.inner
            .lock()
            .settings
            .as_ref()
            .map(GlobalSettings::values)
            .unwrap_or_default()
    }

    pub fn settings(&self) -> Option<GlobalSettings> {
        self.inner.lock().settings.clone()
    }

    // =========================================================================
    // Data dumps
    // =========================================================================

    pub fn item_count(&self, kind: DataKind) -> usize {
        kind.item_count()
    }

    /// Build the request for one item of `kind`
    pub fn request_item(&self, kind: DataKind, item: usize) -> Result<SysexMessage, DeviceError> {
        let identity = self.identity().ok_or(DeviceError::NotIdentified)?;
        Ok(kind.request(&identity, item)?)
    }

    pub async fn send_request(&self, kind: DataKind, item: usize) -> Result<(), DeviceError> {
        let request = self.request_item(kind, item)?;
        self.send(&[request]).await
    }

    /// Decode every `kind` dump in `messages` and update the live state.
    ///
    /// A pattern that passes the layout guard becomes the active pattern; a
    /// settings dump replaces the cached settings.
    pub fn load_data(&self, messages: &[SysexMessage], kind: DataKind) -> Vec<DataFile> {
        let files = kind.load(messages);
        let mut inner = self.inner.lock();
        for file in &files {
            match file.pattern() {
                Some(Ok(pattern)) => inner.active_pattern = Some(pattern),
                Some(Err(e)) => warn!("{}: {}", file.name(), e),
                None => {}
            }
            if let Some(settings) = file.settings() {
                inner.apply_settings(settings.clone());
            }
        }
        debug!("Loaded {} {} dump(s)", files.len(), kind);
        files
    }

    /// Most recently loaded pattern
    pub fn active_pattern(&self) -> Option<PatternData> {
        self.inner.lock().active_pattern.clone()
    }

    // =========================================================================
    // Capabilities the RD-8 does not have
    // =========================================================================

    pub fn has_local_control(&self) -> bool {
        false
    }

    pub fn set_local_control(&self, _on: bool) -> Result<(), DeviceError> {
        Err(DeviceError::NotSupported("local control".to_string()))
    }

    pub fn has_midi_control(&self) -> bool {
        false
    }

    pub fn set_midi_control(&self, _on: bool) -> Result<(), DeviceError> {
        Err(DeviceError::NotSupported("MIDI control".to_string()))
    }

    async fn send(&self, messages: &[SysexMessage]) -> Result<(), DeviceError> {
        for message in messages {
            debug!(
                "TX {} ({} bytes)",
                classify(message.data()).name(),
                message.len()
            );
        }
        self.io.send_now(messages).await?;
        Ok(())
    }
}

/// Take the outstanding roundtrip if it is `seq`
fn take_roundtrip(inner: &mut SessionInner, seq: u64) -> Option<Roundtrip> {
    if inner.roundtrip.as_ref().is_some_and(|rt| rt.seq == seq) {
        inner.roundtrip.take()
    } else {
        None
    }
}

fn complete(op: SettingsOperation, result: SettingsResult) {
    match op {
        SettingsOperation::RefreshChannels => {
            if let Err(e) = result {
                warn!("Channel refresh failed: {}", e);
            }
        }
        SettingsOperation::Callback(callback) => callback(result),
        SettingsOperation::Waiter(tx) => {
            // receiver gone means the caller stopped waiting
            let _ = tx.send(result);
        }
    }
}

/// An outstanding settings read
///
/// Dropping the handle without awaiting it releases the roundtrip slot.
pub struct PendingSettings<'a> {
    session: &'a DeviceSession,
    seq: u64,
    deadline: Instant,
    rx: oneshot::Receiver<SettingsResult>,
}

impl PendingSettings<'_> {
    /// Wait for the reply, up to the configured reply timeout
    pub async fn wait(mut self) -> Result<GlobalSettings, DeviceError> {
        match tokio::time::timeout_at(self.deadline, &mut self.rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(DeviceError::Cancelled),
            Err(_) => {
                if self.session.release(self.seq) {
                    warn!("Settings roundtrip {} timed out", self.seq);
                }
                Err(DeviceError::Timeout)
            }
        }
    }
}

impl Drop for PendingSettings<'_> {
    fn drop(&mut self) {
        if self.session.release(self.seq) {
            debug!("Settings roundtrip {} abandoned", self.seq);
        }
    }
}
