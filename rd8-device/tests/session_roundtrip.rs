//! Integration tests for the device session.
//!
//! A recording mock stands in for the MIDI ports; device replies are fed
//! back through `handle_message` the way a host's MIDI input callback would.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rd8_device::{
    DeviceError, DeviceSession, IoError, MessageOutcome, MidiChannel, MidiIo, SessionConfig,
    SessionState,
};
use rd8_sysex::framing::msg;
use rd8_sysex::{escape, frame, unescape, DataKind, DeviceIdentity, FirmwareVersion, SysexMessage};

#[derive(Default)]
struct MockIo {
    sent: Mutex<Vec<SysexMessage>>,
    input_enabled: AtomicBool,
    fail: AtomicBool,
}

impl MockIo {
    fn sent(&self) -> Vec<SysexMessage> {
        self.sent.lock().clone()
    }

    fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    fn last(&self) -> SysexMessage {
        self.sent.lock().last().cloned().expect("nothing sent")
    }
}

#[async_trait]
impl MidiIo for MockIo {
    async fn enable_input(&self) -> Result<(), IoError> {
        self.input_enabled.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn send_now(&self, messages: &[SysexMessage]) -> Result<(), IoError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(IoError::SendFailed("port closed".into()));
        }
        self.sent.lock().extend_from_slice(messages);
        Ok(())
    }
}

const DEVICE_ID: u8 = 2;
const VERSION: [u8; 3] = [1, 0, 5];

fn firmware_reply(device_id: u8) -> SysexMessage {
    frame(
        device_id,
        msg::FIRMWARE,
        msg::REPLY,
        &[0, 0, 0, 0, VERSION[0], VERSION[1], VERSION[2]],
    )
}

fn settings_block(rx: u8, tx: u8) -> Vec<u8> {
    let mut data = vec![0u8; 115];
    data[4] = DEVICE_ID;
    data[7] = rx;
    data[8] = tx;
    data[40] = 120; // global tempo
    data[41] = 50; // global swing
    data
}

fn dump_with_preamble(kind: DataKind, body: &[u8]) -> SysexMessage {
    let mut payload = vec![0x30, 0, 0, 0, VERSION[0], VERSION[1], VERSION[2]];
    payload.extend_from_slice(body);
    frame(DEVICE_ID, msg::DATA, kind.response_id(), &payload)
}

fn settings_dump(rx: u8, tx: u8) -> SysexMessage {
    dump_with_preamble(DataKind::GlobalSettings, &escape(&settings_block(rx, tx)))
}

fn setup() -> (Arc<MockIo>, DeviceSession) {
    let io = Arc::new(MockIo::default());
    let session = DeviceSession::new(io.clone(), SessionConfig::default());
    (io, session)
}

/// Identify the device and answer the automatic channel refresh
async fn identified() -> (Arc<MockIo>, DeviceSession) {
    let (io, session) = setup();
    session.handle_message(&firmware_reply(DEVICE_ID)).await;
    let outcome = session.handle_message(&settings_dump(0, 0)).await;
    assert_eq!(outcome, MessageOutcome::Settings { matched: true });
    (io, session)
}

fn is_settings_request(message: &SysexMessage) -> bool {
    let data = message.data();
    data.len() == 14 && data[5] == msg::DATA && data[6] == msg::GLOBAL_SETTINGS_REQUEST
}

type Results = Arc<Mutex<Vec<Result<Vec<u8>, DeviceError>>>>;

fn recorder() -> (Results, impl FnOnce(Result<rd8_sysex::GlobalSettings, DeviceError>) + Send) {
    let results: Results = Arc::default();
    let sink = Arc::clone(&results);
    let callback = move |result: Result<rd8_sysex::GlobalSettings, DeviceError>| {
        sink.lock().push(result.map(|s| s.data().to_vec()));
    };
    (results, callback)
}

async fn wait_for_sent(io: &MockIo, count: usize) {
    for _ in 0..100 {
        if io.sent_count() >= count {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("expected {} sent messages, got {}", count, io.sent_count());
}

// ── Handshake ──

#[tokio::test]
async fn detect_sends_identity_request() {
    let (io, session) = setup();
    assert_eq!(session.state(), SessionState::Idle);

    session.detect(0).await.unwrap();
    assert!(io.input_enabled.load(Ordering::SeqCst));
    assert_eq!(io.last().data(), &[0x00, 0x20, 0x32, 0x30, 0x00, 0x06, 0x01]);
    assert_eq!(session.state(), SessionState::AwaitingIdentity);

    assert!(matches!(
        session.detect(16).await,
        Err(DeviceError::InvalidParameter(_))
    ));
}

#[tokio::test]
async fn firmware_reply_sets_identity_and_reads_channels() {
    let (io, session) = setup();
    session.detect(0).await.unwrap();

    // Reply comes from a different address than the one probed
    let outcome = session.handle_message(&firmware_reply(DEVICE_ID)).await;
    let identity = DeviceIdentity::new(DEVICE_ID, FirmwareVersion::new(1, 0, 5));
    assert_eq!(outcome, MessageOutcome::Identified(identity));
    assert_eq!(session.identity(), Some(identity));

    let request = io.last();
    assert!(is_settings_request(&request));
    assert_eq!(request.data()[4], DEVICE_ID);
    assert_eq!(&request.data()[7..], &[0x30, 0, 0, 0, 1, 0, 5]);
    assert_eq!(session.state(), SessionState::AwaitingSettingsReply);

    let outcome = session.handle_message(&settings_dump(9, 16)).await;
    assert_eq!(outcome, MessageOutcome::Settings { matched: true });
    assert_eq!(session.state(), SessionState::Identified);
    assert_eq!(session.input_channel(), Some(MidiChannel::Channel(9)));
    assert_eq!(session.output_channel(), Some(MidiChannel::Omni));
    assert_eq!(session.properties().len(), rd8_sysex::SETTINGS.len());
}

#[tokio::test]
async fn unconfirmed_channel_code_is_not_guessed() {
    let (_io, session) = setup();
    session.handle_message(&firmware_reply(DEVICE_ID)).await;
    session.handle_message(&settings_dump(17, 3)).await;
    assert_eq!(session.input_channel(), None);
    assert_eq!(session.output_channel(), Some(MidiChannel::Channel(3)));
}

#[tokio::test]
async fn foreign_messages_are_ignored() {
    let (_io, session) = identified().await;
    let roland = SysexMessage::new(vec![0x41, 0x10, 0x42, 0x12, 0x40, 0x00, 0x7F, 0x00]);
    assert_eq!(session.handle_message(&roland).await, MessageOutcome::Ignored);
    let live_song = dump_with_preamble(DataKind::LiveSong, &[1, 2, 3]);
    assert_eq!(session.handle_message(&live_song).await, MessageOutcome::Ignored);
}

#[tokio::test]
async fn operations_need_identity() {
    let (_io, session) = setup();
    assert_eq!(session.read_settings().await, Err(DeviceError::NotIdentified));
    assert_eq!(
        session.request_item(DataKind::LiveSong, 0),
        Err(DeviceError::NotIdentified)
    );
    assert_eq!(
        session.write_setting_debounced("Global Tempo", 100),
        Err(DeviceError::NotIdentified)
    );
}

// ── Settings roundtrip ──

#[tokio::test]
async fn reply_is_delivered_to_waiter() {
    let (io, session) = identified().await;
    let pending = session.request_settings().await.unwrap();
    assert!(is_settings_request(&io.last()));

    session.handle_message(&settings_dump(4, 5)).await;
    let settings = pending.wait().await.unwrap();
    assert_eq!(settings.data(), settings_block(4, 5).as_slice());
    assert_eq!(session.state(), SessionState::Identified);
}

#[tokio::test]
async fn second_request_while_pending_is_busy() {
    let (io, session) = identified().await;
    let (results, callback) = recorder();
    session.with_global_settings(callback).await.unwrap();
    let sent = io.sent_count();

    // Neither form of request may queue or preempt
    assert!(matches!(
        session.request_settings().await,
        Err(DeviceError::Busy)
    ));
    let (rejected, second) = recorder();
    assert_eq!(
        session.with_global_settings(second).await,
        Err(DeviceError::Busy)
    );
    assert_eq!(io.sent_count(), sent);

    session.handle_message(&settings_dump(1, 1)).await;
    assert_eq!(results.lock().len(), 1);
    assert!(results.lock()[0].is_ok());
    assert!(rejected.lock().is_empty());

    // A late duplicate does not run the handler again
    let outcome = session.handle_message(&settings_dump(1, 1)).await;
    assert_eq!(outcome, MessageOutcome::Settings { matched: false });
    assert_eq!(results.lock().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn lost_reply_times_out_and_frees_the_slot() {
    let (_io, session) = identified().await;
    assert_eq!(session.read_settings().await, Err(DeviceError::Timeout));
    assert_eq!(session.state(), SessionState::Identified);

    // Slot is free again
    let pending = session.request_settings().await.unwrap();
    session.handle_message(&settings_dump(0, 0)).await;
    assert!(pending.wait().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn expired_callback_gets_timeout_once() {
    let (_io, session) = identified().await;
    let (results, callback) = recorder();
    session.with_global_settings(callback).await.unwrap();

    tokio::time::advance(Duration::from_secs(3)).await;
    assert_eq!(session.state(), SessionState::Identified);

    let (second_results, second) = recorder();
    session.with_global_settings(second).await.unwrap();
    assert!(matches!(results.lock().as_slice(), [Err(DeviceError::Timeout)]));

    session.handle_message(&settings_dump(0, 0)).await;
    assert_eq!(results.lock().len(), 1);
    assert_eq!(second_results.lock().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn callback_times_out_at_deadline() {
    let (io, session) = identified().await;
    let before = io.sent_count();
    let (results, callback) = recorder();
    session.with_global_settings(callback).await.unwrap();

    // No further request is needed for the timeout to be delivered
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(matches!(results.lock().as_slice(), [Err(DeviceError::Timeout)]));
    assert_eq!(io.sent_count(), before + 1);
    assert_eq!(session.state(), SessionState::Identified);

    let outcome = session.handle_message(&settings_dump(0, 0)).await;
    assert_eq!(outcome, MessageOutcome::Settings { matched: false });
    assert_eq!(results.lock().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn late_reply_is_not_matched() {
    let (_io, session) = identified().await;
    let pending = session.request_settings().await.unwrap();

    tokio::time::advance(Duration::from_secs(3)).await;
    let outcome = session.handle_message(&settings_dump(4, 4)).await;
    assert_eq!(outcome, MessageOutcome::Settings { matched: false });
    assert_eq!(pending.wait().await, Err(DeviceError::Timeout));

    // The late dump still refreshes the cache
    assert_eq!(session.input_channel(), Some(MidiChannel::Channel(4)));
}

#[tokio::test]
async fn cancel_releases_pending_roundtrip() {
    let (_io, session) = identified().await;
    let (results, callback) = recorder();
    session.with_global_settings(callback).await.unwrap();

    assert!(session.cancel_pending());
    assert!(!session.cancel_pending());
    assert!(matches!(results.lock().as_slice(), [Err(DeviceError::Cancelled)]));

    let outcome = session.handle_message(&settings_dump(0, 0)).await;
    assert_eq!(outcome, MessageOutcome::Settings { matched: false });
    assert_eq!(results.lock().len(), 1);
}

#[tokio::test]
async fn dropped_handle_releases_slot() {
    let (_io, session) = identified().await;
    let pending = session.request_settings().await.unwrap();
    drop(pending);
    assert_eq!(session.state(), SessionState::Identified);
    assert!(session.request_settings().await.is_ok());
}

#[tokio::test]
async fn failed_send_releases_slot() {
    let (io, session) = identified().await;
    io.fail.store(true, Ordering::SeqCst);
    assert!(matches!(
        session.read_settings().await,
        Err(DeviceError::Io(IoError::SendFailed(_)))
    ));
    io.fail.store(false, Ordering::SeqCst);
    assert!(session.request_settings().await.is_ok());
}

#[tokio::test]
async fn reset_cancels_and_forgets() {
    let (_io, session) = identified().await;
    let (results, callback) = recorder();
    session.with_global_settings(callback).await.unwrap();

    session.reset();
    assert!(matches!(results.lock().as_slice(), [Err(DeviceError::Cancelled)]));
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.identity(), None);
    assert!(session.settings().is_none());
}

// ── Channel changes ──

#[tokio::test]
async fn change_input_channel_writes_whole_settings_block() {
    let (io, session) = identified().await;
    let session = Arc::new(session);
    let before = io.sent_count();

    let task = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.change_input_channel(MidiChannel::Channel(3)).await })
    };
    wait_for_sent(&io, before + 1).await;
    assert!(is_settings_request(&io.last()));

    session.handle_message(&settings_dump(9, 16)).await;
    task.await.unwrap().unwrap();

    let write = io.last();
    let data = write.data();
    // request-style frame with the response ID, then the escaped block
    assert_eq!(
        &data[..14],
        &[0x00, 0x20, 0x32, 0x30, DEVICE_ID, 0x10, 0x0A, 0x30, 0, 0, 0, 1, 0, 5]
    );
    let mut expected = settings_block(9, 16);
    expected[7] = 3;
    assert_eq!(unescape(&data[14..]), expected);

    assert_eq!(session.input_channel(), Some(MidiChannel::Channel(3)));
    assert_eq!(session.output_channel(), Some(MidiChannel::Omni));
}

#[tokio::test]
async fn change_output_channel_to_omni() {
    let (io, session) = identified().await;
    let session = Arc::new(session);
    let before = io.sent_count();

    let task = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.change_output_channel(MidiChannel::Omni).await })
    };
    wait_for_sent(&io, before + 1).await;
    session.handle_message(&settings_dump(0, 5)).await;
    task.await.unwrap().unwrap();

    assert_eq!(unescape(&io.last().data()[14..])[8], 16);
    assert_eq!(session.output_channel(), Some(MidiChannel::Omni));
}

#[tokio::test]
async fn change_channel_rejects_out_of_range_channel() {
    let (io, session) = identified().await;
    let before = io.sent_count();
    assert!(matches!(
        session.change_input_channel(MidiChannel::Channel(16)).await,
        Err(DeviceError::InvalidParameter(_))
    ));
    assert_eq!(io.sent_count(), before);
    assert_eq!(session.input_channel(), Some(MidiChannel::Channel(0)));
}

#[tokio::test]
async fn unsupported_controls_report_not_supported() {
    let (_io, session) = setup();
    assert!(!session.has_local_control());
    assert!(!session.has_midi_control());
    assert!(matches!(
        session.set_local_control(false),
        Err(DeviceError::NotSupported(_))
    ));
    assert!(matches!(
        session.set_midi_control(true),
        Err(DeviceError::NotSupported(_))
    ));
}

// ── Debounced edits ──

#[tokio::test(start_paused = true)]
async fn debounced_edits_coalesce_into_one_write() {
    let (io, session) = identified().await;
    let before = io.sent_count();

    session.write_setting_debounced("Global Tempo", 100).unwrap();
    session.write_setting_debounced("Global Tempo", 130).unwrap();
    session.write_setting_debounced("Global Swing", 60).unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(io.sent_count(), before);

    tokio::time::sleep(Duration::from_millis(300)).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    let sent = io.sent();
    assert_eq!(sent.len(), before + 1);

    let block = unescape(&sent[before].data()[14..]);
    assert_eq!(block[40], 130);
    assert_eq!(block[41], 60);
    assert_eq!(session.settings().unwrap().peek("Global Tempo"), Ok(130));
}

#[tokio::test]
async fn debounced_edit_rejects_invalid_value() {
    let (_io, session) = identified().await;
    let before = session.settings();
    assert!(matches!(
        session.write_setting_debounced("Global Swing", 99),
        Err(DeviceError::Settings(_))
    ));
    assert!(matches!(
        session.write_setting_debounced("Local Control", 1),
        Err(DeviceError::Settings(_))
    ));
    assert_eq!(session.settings(), before);
}

// ── Data dumps ──

#[tokio::test]
async fn load_data_tracks_active_pattern() {
    let (_io, session) = identified().await;

    let mut payload = vec![0u8; 889];
    payload[1] = 0x08;
    payload[804] = 133;
    let good = dump_with_preamble(DataKind::LivePattern, &escape(&payload));
    payload[1] = 0x07;
    let unsupported = dump_with_preamble(DataKind::LivePattern, &escape(&payload));

    let files = session.load_data(&[good, unsupported], DataKind::LivePattern);
    assert_eq!(files.len(), 2);
    // The guard failure does not replace the last good pattern
    assert_eq!(session.active_pattern().unwrap().tempo, 133);
}

#[tokio::test]
async fn request_item_uses_identity() {
    let (_io, session) = identified().await;
    assert_eq!(session.item_count(DataKind::StoredPattern), 256);
    let request = session.request_item(DataKind::StoredPattern, 17).unwrap();
    assert_eq!(request.data()[4], DEVICE_ID);
    assert_eq!(&request.data()[14..], &[1, 1]);
    assert!(matches!(
        session.request_item(DataKind::StoredSong, 16),
        Err(DeviceError::Sysex(_))
    ));
}
