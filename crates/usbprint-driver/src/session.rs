//! 打印机会话
//!
//! 一个会话对应一台打印机（一个 [`DeviceIdentity`]），独占自己的 [`Channel`]。
//! 会话内部的所有操作都在会话锁下串行执行，包括阻塞的 USB 传输。
//!
//! 控制命令（切纸、钱箱、蜂鸣器、原始字节）都是尽力而为：无论硬件是否
//! 收到，调用方都视为成功。返回的 [`WriteOutcome`] 只用于诊断。

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, trace};

use usbprint_protocol::{
    DeviceIdentity, LINE_TERMINATOR, PaperStatus, PrinterCommand, StatusRequest,
    cut_by_mode_bytes, encode_text,
};
use usbprint_usb::{Channel, UsbBackend, UsbDevice, WriteOutcome};

use crate::DriverError;
use crate::notice::{DisconnectReason, NoticeSender, SessionNotice};

struct SessionState {
    connected: bool,
    channel: Channel,
    sinks: Vec<NoticeSender>,
}

/// 打印机会话
pub struct PrinterSession {
    identity: DeviceIdentity,
    state: Mutex<SessionState>,
}

impl PrinterSession {
    /// 创建待授权会话
    pub fn new(backend: Arc<dyn UsbBackend>, device: UsbDevice) -> Self {
        Self {
            identity: device.identity,
            state: Mutex::new(SessionState {
                connected: false,
                channel: Channel::new(backend, device),
                sinks: Vec::new(),
            }),
        }
    }

    pub fn identity(&self) -> DeviceIdentity {
        self.identity
    }

    pub fn name(&self) -> String {
        self.identity.printer_name()
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    /// 登记通知接收方
    ///
    /// 会话已连接时立即补发 `Connected`。
    pub fn attach_sink(&self, sink: NoticeSender) {
        let mut state = self.state.lock();
        if state.connected && sink.send(SessionNotice::Connected).is_err() {
            return;
        }
        state.sinks.push(sink);
    }

    /// 进入已连接状态，通知所有接收方（通道保持打开，之后还会收到断开通知）
    pub fn mark_connected(&self) {
        let mut state = self.state.lock();
        state.connected = true;
        state
            .sinks
            .retain(|sink| sink.send(SessionNotice::Connected).is_ok());
        info!(printer = %self.identity, "Printer connected");
    }

    /// 关闭会话：关闭通道，发送终止通知并丢弃所有接收方
    pub fn close(&self, reason: DisconnectReason) {
        let mut state = self.state.lock();
        state.connected = false;
        state.channel.close();
        for sink in state.sinks.drain(..) {
            let _ = sink.send(SessionNotice::Disconnected(reason));
        }
        info!(printer = %self.identity, ?reason, "Printer session closed");
    }

    /// 查询纸张状态
    ///
    /// 状态字节为 `0x38` 时缺纸；其他值（包括读取失败得到的 0）都视为有纸。
    pub fn is_paper_available(&self) -> bool {
        let mut state = self.state.lock();
        Self::paper_status(&mut state).is_available()
    }

    fn paper_status(state: &mut SessionState) -> PaperStatus {
        let request = StatusRequest::PAPER;
        let response = state.channel.control_read(
            request.request_type,
            request.request,
            request.value,
            request.index,
            request.length,
        );
        let status = PaperStatus::from_response(&response);
        trace!(response = ?response, ?status, "Paper status");
        status
    }

    /// 打印文本
    ///
    /// 先查纸张状态：缺纸时不写入，返回 `PaperOut`。空文本不写入，直接成功。
    /// 否则写入编码后的文本，再写入 `CR LF`。
    pub fn print(&self, message: &str, charset: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        if !Self::paper_status(&mut state).is_available() {
            debug!(printer = %self.identity, "Print refused, paper out");
            return Err(DriverError::PaperOut(self.name()));
        }

        if message.is_empty() {
            return Ok(());
        }

        let text = encode_text(message, charset);
        Self::log_outcome(self.identity, "print", state.channel.write(&text.bytes));
        Self::log_outcome(self.identity, "line terminator", state.channel.write(&LINE_TERMINATOR));
        Ok(())
    }

    pub fn cut_paper(&self, feed: i32) -> WriteOutcome {
        self.send_command(PrinterCommand::cut_paper(feed))
    }

    /// 按模式切纸，0 全切，1 半切；其他值不发送任何字节
    pub fn cut_by_mode(&self, mode: i32) -> Option<WriteOutcome> {
        match cut_by_mode_bytes(mode) {
            Some(bytes) => Some(self.send_raw(&bytes)),
            None => {
                debug!(printer = %self.identity, mode, "Unsupported cut mode ignored");
                None
            },
        }
    }

    pub fn open_cash_box(&self) -> WriteOutcome {
        self.send_command(PrinterCommand::OpenCashBox)
    }

    pub fn default_buzzer(&self) -> WriteOutcome {
        self.send_command(PrinterCommand::DefaultBuzzer)
    }

    pub fn buzzer(&self, count: i32, duration: i32) -> WriteOutcome {
        self.send_command(PrinterCommand::buzzer(count, duration))
    }

    pub fn set_buzzer_mode(&self, count: i32, duration: i32, mode: i32) -> WriteOutcome {
        self.send_command(PrinterCommand::buzzer_mode(count, duration, mode))
    }

    pub fn send_command(&self, command: PrinterCommand) -> WriteOutcome {
        let outcome = self.state.lock().channel.write(&command.to_bytes());
        Self::log_outcome(self.identity, "command", outcome);
        outcome
    }

    /// 原样写入调用方提供的字节
    pub fn send_raw(&self, bytes: &[u8]) -> WriteOutcome {
        let outcome = self.state.lock().channel.write(bytes);
        Self::log_outcome(self.identity, "raw", outcome);
        outcome
    }

    fn log_outcome(identity: DeviceIdentity, what: &str, outcome: WriteOutcome) {
        match outcome {
            WriteOutcome::Sent(len) => trace!(printer = %identity, what, len, "Sent"),
            WriteOutcome::Dropped(reason) => {
                debug!(printer = %identity, what, ?reason, "Write dropped")
            },
        }
    }
}

impl std::fmt::Debug for PrinterSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrinterSession")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use usbprint_usb::DropReason;
    use usbprint_usb::mock::{MockBackend, MockStatus};

    fn setup() -> (Arc<MockBackend>, PrinterSession, DeviceIdentity) {
        let backend = Arc::new(MockBackend::new());
        let identity = DeviceIdentity::new(1155, 1002);
        backend.add_device(MockBackend::printer(identity));
        backend.grant(identity);
        let session = PrinterSession::new(backend.clone(), MockBackend::printer(identity));
        (backend, session, identity)
    }

    #[test]
    fn test_paper_status_mapping() {
        let (backend, session, identity) = setup();

        backend.set_status(identity, MockStatus::Response(vec![0x38, 0x00]));
        assert!(!session.is_paper_available());

        backend.set_status(identity, MockStatus::Response(vec![0x12, 0x00]));
        assert!(session.is_paper_available());

        backend.set_status(identity, MockStatus::Fail);
        assert!(session.is_paper_available());
    }

    #[test]
    fn test_print_writes_message_then_terminator() {
        let (backend, session, identity) = setup();

        session.print("中文", "GBK").unwrap();
        assert_eq!(
            backend.writes(identity),
            vec![vec![0xD6, 0xD0, 0xCE, 0xC4], vec![0x0D, 0x0A]]
        );
    }

    #[test]
    fn test_print_empty_message_writes_nothing() {
        let (backend, session, identity) = setup();

        assert!(session.print("", "GBK").is_ok());
        assert!(backend.writes(identity).is_empty());
    }

    #[test]
    fn test_print_paper_out_writes_nothing() {
        let (backend, session, identity) = setup();
        backend.set_status(identity, MockStatus::Response(vec![0x38, 0x00]));

        let err = session.print("hello", "GBK").unwrap_err();
        assert!(err.is_paper_out());
        assert!(backend.writes(identity).is_empty());
    }

    #[test]
    fn test_print_unknown_charset_falls_back() {
        let (backend, session, identity) = setup();

        session.print("abc", "no-such-charset").unwrap();
        assert_eq!(backend.writes(identity)[0], b"abc".to_vec());
    }

    #[test]
    fn test_commands_bytes() {
        let (backend, session, identity) = setup();

        session.cut_paper(5);
        session.open_cash_box();
        session.default_buzzer();
        session.buzzer(3, 2);
        session.set_buzzer_mode(3, 2, 1);
        session.cut_by_mode(1);

        assert_eq!(
            backend.writes(identity),
            vec![
                vec![0x1D, 0x56, 0x42, 0x05],
                vec![0x1B, 0x70, 0x00, 0x40, 0x50],
                vec![0x1B, 0x42, 0x04, 0x01],
                vec![0x1B, 0x42, 0x03, 0x02],
                vec![0x1B, 0x43, 0x03, 0x02, 0x01],
                vec![0x1D, 0x56, 0x31],
            ]
        );
    }

    #[test]
    fn test_invalid_cut_mode_sends_nothing() {
        let (backend, session, identity) = setup();

        assert_eq!(session.cut_by_mode(2), None);
        assert_eq!(session.cut_by_mode(-1), None);
        assert!(backend.writes(identity).is_empty());
    }

    #[test]
    fn test_send_raw_is_unmodified() {
        let (backend, session, identity) = setup();

        assert_eq!(session.send_raw(&[0x1B, 0x40]), WriteOutcome::Sent(2));
        assert_eq!(backend.writes(identity), vec![vec![0x1B, 0x40]]);
    }

    #[test]
    fn test_write_failure_still_reports_outcome_only() {
        let (backend, session, identity) = setup();
        backend.fail_open(identity, true);

        assert_eq!(
            session.cut_paper(0),
            WriteOutcome::Dropped(DropReason::OpenFailed)
        );
    }

    #[test]
    fn test_mark_connected_keeps_sink_open() {
        let (_backend, session, _identity) = setup();
        let (tx, rx) = unbounded();
        session.attach_sink(tx);

        session.mark_connected();
        assert!(session.is_connected());
        assert_eq!(rx.try_recv(), Ok(SessionNotice::Connected));

        session.close(DisconnectReason::Requested);
        assert!(!session.is_connected());
        assert_eq!(
            rx.try_recv(),
            Ok(SessionNotice::Disconnected(DisconnectReason::Requested))
        );
        // 终止通知之后发送端被丢弃
        assert!(rx.recv().is_err());
    }

    #[test]
    fn test_attach_sink_to_connected_session() {
        let (_backend, session, _identity) = setup();
        session.mark_connected();

        let (tx, rx) = unbounded();
        session.attach_sink(tx);
        assert_eq!(rx.try_recv(), Ok(SessionNotice::Connected));
    }

    #[test]
    fn test_close_is_idempotent() {
        let (_backend, session, _identity) = setup();
        session.cut_paper(0);

        session.close(DisconnectReason::Detached);
        session.close(DisconnectReason::Detached);
        assert!(!session.is_connected());
    }
}
