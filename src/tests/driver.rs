use crate::buffer::RxChannel;
use crate::commands::Command;
use crate::dispatch::{CommandError, CommandStatus};
use crate::driver::Driver;
use crate::stack::LinkKind;
use crate::tests::mock::{record_data, MockTimer, Recorder, TestSerial};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

type TestDriver<'q> = Driver<'q, TestSerial<'q, 1024>, MockTimer, Recorder, 1_000_000, 1024, 256, 64>;

#[test]
fn test_wifi_events_update_join_state() {
    let mut channel: RxChannel<1024> = RxChannel::new();
    let (producer, consumer) = channel.split();
    let mut driver: TestDriver =
        Driver::new(TestSerial::new(producer), MockTimer::monotonic(), consumer, Recorder::default());

    driver.serial.inject(b"WIFI CONNECTED\r\nWIFI GOT IP\r\n");
    driver.process();

    assert!(driver.join_state().connected);
    assert!(driver.join_state().ip_assigned);
    assert_eq!(vec!["wifi connected", "got ip"], driver.handler().events);
}

#[test]
fn test_wifi_disconnect_releases_links() {
    let mut channel: RxChannel<1024> = RxChannel::new();
    let (producer, consumer) = channel.split();
    let mut driver: TestDriver =
        Driver::new(TestSerial::new(producer), MockTimer::monotonic(), consumer, Recorder::default());

    driver.serial.inject(b"WIFI CONNECTED\r\nWIFI GOT IP\r\n0,CONNECT\r\n");
    driver.process();
    assert!(driver.link(0).unwrap().is_active());

    driver.serial.inject(b"WIFI DISCONNECT\r\n");
    driver.process();

    assert!(!driver.join_state().connected);
    assert!(!driver.join_state().ip_assigned);
    // Releasing happens silently, only the disconnect itself is reported
    assert!(!driver.link(0).unwrap().is_active());
    assert_eq!(
        vec!["wifi connected", "got ip", "link 0 opened", "wifi disconnected"],
        driver.handler().events
    );
}

#[test]
fn test_boot_banner_clears_session_state() {
    let mut channel: RxChannel<1024> = RxChannel::new();
    let (producer, consumer) = channel.split();
    let mut driver: TestDriver =
        Driver::new(TestSerial::new(producer), MockTimer::monotonic(), consumer, Recorder::default());

    driver.serial.inject(b"WIFI CONNECTED\r\nWIFI GOT IP\r\n1,CONNECT\r\n");
    driver.process();

    driver.serial.inject(b"ready\r\n");
    driver.process();

    assert!(!driver.join_state().connected);
    assert!(!driver.join_state().ip_assigned);
    assert!(!driver.link(1).unwrap().is_active());
    assert_eq!(None, driver.wifi_mode());
    assert_eq!(
        vec!["wifi connected", "got ip", "link 1 opened", "ready"],
        driver.handler().events
    );
}

#[test]
fn test_watchdog_reset_reported() {
    let mut channel: RxChannel<1024> = RxChannel::new();
    let (producer, consumer) = channel.split();
    let mut driver: TestDriver =
        Driver::new(TestSerial::new(producer), MockTimer::monotonic(), consumer, Recorder::default());

    driver.serial.inject(b"wdt reset\r\n");
    driver.process();

    assert_eq!(vec!["watchdog reset"], driver.handler().events);
}

#[test]
fn test_command_resolves_on_ok() {
    let mut channel: RxChannel<1024> = RxChannel::new();
    let (producer, consumer) = channel.split();
    let mut driver: TestDriver =
        Driver::new(TestSerial::new(producer), MockTimer::monotonic(), consumer, Recorder::default());

    driver.issue(Command::probe()).unwrap();
    assert_eq!(CommandStatus::Pending, driver.command_state());
    assert_eq!(Err(nb::Error::WouldBlock), driver.poll());

    driver.serial.inject(b"OK\r\n");
    assert_eq!(Ok(()), driver.poll());
    assert_eq!(CommandStatus::Idle, driver.command_state());
    assert_eq!(vec!["AT\r\n"], driver.serial.get_commands_as_strings());
}

#[test]
fn test_command_failure_terminators() {
    let mut channel: RxChannel<1024> = RxChannel::new();
    let (producer, consumer) = channel.split();
    let mut driver: TestDriver =
        Driver::new(TestSerial::new(producer), MockTimer::monotonic(), consumer, Recorder::default());

    driver.issue(Command::probe()).unwrap();
    driver.serial.inject(b"ERROR\r\n");
    assert_eq!(
        Err(nb::Error::Other(CommandError::Failed)),
        driver.poll()
    );

    driver.issue(Command::probe()).unwrap();
    driver.serial.inject(b"busy p...\r\n");
    assert_eq!(
        Err(nb::Error::Other(CommandError::Failed)),
        driver.poll()
    );
}

#[test]
fn test_second_command_rejected_while_pending() {
    let mut channel: RxChannel<1024> = RxChannel::new();
    let (producer, consumer) = channel.split();
    let mut driver: TestDriver =
        Driver::new(TestSerial::new(producer), MockTimer::monotonic(), consumer, Recorder::default());

    driver.issue(Command::probe()).unwrap();
    assert_eq!(CommandError::Busy, driver.issue(Command::scan()).unwrap_err());

    // The rejected command was never transmitted
    assert_eq!(vec!["AT\r\n"], driver.serial.get_commands_as_strings());
}

#[test]
fn test_response_text_recorded_echo_skipped() {
    let mut channel: RxChannel<1024> = RxChannel::new();
    let (producer, consumer) = channel.split();
    let mut driver: TestDriver =
        Driver::new(TestSerial::new(producer), MockTimer::monotonic(), consumer, Recorder::default());

    driver.issue(Command::probe()).unwrap();
    driver.serial.inject(b"AT\r\nno change\r\nOK\r\n");

    assert_eq!(Ok(()), driver.poll());
    assert_eq!("no change", driver.response());
}

#[test]
fn test_stray_input_while_idle_dropped() {
    let mut channel: RxChannel<1024> = RxChannel::new();
    let (producer, consumer) = channel.split();
    let mut driver: TestDriver =
        Driver::new(TestSerial::new(producer), MockTimer::monotonic(), consumer, Recorder::default());

    driver.serial.inject(b"OK\r\nERROR\r\nrandom text\r\n");
    driver.process();

    assert_eq!(Ok(()), driver.poll());
    assert_eq!(CommandStatus::Idle, driver.command_state());
    assert!(driver.handler().events.is_empty());
    assert_eq!("", driver.response());
}

#[test]
fn test_timeout_trips_strictly_after_deadline() {
    let clock = Arc::new(AtomicU32::new(0));
    let mut channel: RxChannel<1024> = RxChannel::new();
    let (producer, consumer) = channel.split();
    let mut driver: TestDriver = Driver::new(
        TestSerial::new(producer),
        MockTimer::manual(clock.clone()),
        consumer,
        Recorder::default(),
    );

    driver.issue(Command::probe()).unwrap();

    // 30 s default, measured in microsecond ticks
    clock.store(30_000_000, Ordering::Relaxed);
    assert_eq!(Err(nb::Error::WouldBlock), driver.poll());

    clock.store(30_000_001, Ordering::Relaxed);
    assert_eq!(
        Err(nb::Error::Other(CommandError::Timeout)),
        driver.poll()
    );
    assert_eq!(CommandStatus::Idle, driver.command_state());
}

#[test]
fn test_stale_reply_consumed_before_next_command() {
    let clock = Arc::new(AtomicU32::new(0));
    let mut channel: RxChannel<1024> = RxChannel::new();
    let (producer, consumer) = channel.split();
    let mut driver: TestDriver = Driver::new(
        TestSerial::new(producer),
        MockTimer::manual(clock.clone()),
        consumer,
        Recorder::default(),
    );

    driver.issue(Command::probe()).unwrap();
    clock.store(30_000_001, Ordering::Relaxed);
    assert_eq!(
        Err(nb::Error::Other(CommandError::Timeout)),
        driver.poll()
    );

    // The reply of the timed-out command arrives late. It must not resolve
    // the next command.
    driver.serial.inject(b"OK\r\n");
    driver.issue(Command::scan()).unwrap();
    assert_eq!(Err(nb::Error::WouldBlock), driver.poll());

    driver.serial.inject(b"OK\r\n");
    assert_eq!(Ok(()), driver.poll());
}

#[test]
fn test_timeout_releases_half_claimed_link() {
    let clock = Arc::new(AtomicU32::new(0));
    let mut channel: RxChannel<1024> = RxChannel::new();
    let (producer, consumer) = channel.split();
    let mut driver: TestDriver = Driver::new(
        TestSerial::new(producer),
        MockTimer::manual(clock.clone()),
        consumer,
        Recorder::default(),
    );

    driver.links.claim(1).unwrap();
    driver
        .issue(Command::connect(1, LinkKind::Tcp, "10.0.0.1", 80).unwrap())
        .unwrap();

    clock.store(30_000_001, Ordering::Relaxed);
    assert_eq!(
        Err(nb::Error::Other(CommandError::Timeout)),
        driver.poll()
    );
    assert!(!driver.link(1).unwrap().is_active());
}

#[test]
fn test_set_timeout_applies_to_next_command() {
    let clock = Arc::new(AtomicU32::new(0));
    let mut channel: RxChannel<1024> = RxChannel::new();
    let (producer, consumer) = channel.split();
    let mut driver: TestDriver = Driver::new(
        TestSerial::new(producer),
        MockTimer::manual(clock.clone()),
        consumer,
        Recorder::default(),
    );

    driver.set_timeout(MockTimer::duration_ms(50));
    driver.issue(Command::probe()).unwrap();

    clock.store(50_000, Ordering::Relaxed);
    assert_eq!(Err(nb::Error::WouldBlock), driver.poll());

    clock.store(50_001, Ordering::Relaxed);
    assert_eq!(
        Err(nb::Error::Other(CommandError::Timeout)),
        driver.poll()
    );
}

#[test]
fn test_connect_resolves_on_link_notification_not_ok() {
    let mut channel: RxChannel<1024> = RxChannel::new();
    let (producer, consumer) = channel.split();
    let mut driver: TestDriver =
        Driver::new(TestSerial::new(producer), MockTimer::monotonic(), consumer, Recorder::default());

    driver.links.claim(0).unwrap();
    driver
        .issue(Command::connect(0, LinkKind::Tcp, "10.0.0.1", 80).unwrap())
        .unwrap();

    driver.serial.inject(b"OK\r\n");
    assert_eq!(Err(nb::Error::WouldBlock), driver.poll());

    driver.serial.inject(b"0,CONNECT\r\n");
    assert_eq!(Ok(()), driver.poll());
    assert!(driver.link(0).unwrap().is_active());
    assert_eq!(vec!["link 0 opened"], driver.handler().events);
}

#[test]
fn test_connect_fail_notification_releases_link() {
    let mut channel: RxChannel<1024> = RxChannel::new();
    let (producer, consumer) = channel.split();
    let mut driver: TestDriver =
        Driver::new(TestSerial::new(producer), MockTimer::monotonic(), consumer, Recorder::default());

    driver.links.claim(0).unwrap();
    driver
        .issue(Command::connect(0, LinkKind::Tcp, "10.0.0.1", 80).unwrap())
        .unwrap();

    driver.serial.inject(b"0,CONNECT FAIL\r\nERROR\r\n");
    assert_eq!(
        Err(nb::Error::Other(CommandError::Failed)),
        driver.poll()
    );
    // The trailing ERROR is a stray line by now
    assert_eq!(Ok(()), driver.poll());
    assert!(!driver.link(0).unwrap().is_active());
}

#[test]
fn test_already_connected_resolved_by_error() {
    let mut channel: RxChannel<1024> = RxChannel::new();
    let (producer, consumer) = channel.split();
    let mut driver: TestDriver =
        Driver::new(TestSerial::new(producer), MockTimer::monotonic(), consumer, Recorder::default());

    driver.links.claim(2).unwrap();
    driver
        .issue(Command::connect(2, LinkKind::Tcp, "10.0.0.1", 80).unwrap())
        .unwrap();

    driver.serial.inject(b"ALREADY CONNECTED\r\nERROR\r\n");
    assert_eq!(
        Err(nb::Error::Other(CommandError::Failed)),
        driver.poll()
    );
    assert!(!driver.link(2).unwrap().is_active());
}

#[test]
fn test_reset_resolves_on_boot_banner() {
    let mut channel: RxChannel<1024> = RxChannel::new();
    let (producer, consumer) = channel.split();
    let mut driver: TestDriver =
        Driver::new(TestSerial::new(producer), MockTimer::monotonic(), consumer, Recorder::default());

    driver.issue(Command::reset()).unwrap();

    driver.serial.inject(b"OK\r\n");
    assert_eq!(Err(nb::Error::WouldBlock), driver.poll());

    driver.serial.inject(b"ready\r\n");
    assert_eq!(Ok(()), driver.poll());
    assert_eq!(vec!["ready"], driver.handler().events);
}

#[test]
fn test_send_handshake() {
    let mut channel: RxChannel<1024> = RxChannel::new();
    let (producer, consumer) = channel.split();
    let mut driver: TestDriver =
        Driver::new(TestSerial::new(producer), MockTimer::monotonic(), consumer, Recorder::default());

    driver.serial.inject(b"0,CONNECT\r\n");
    driver.process();

    driver.issue(Command::send_request(0).unwrap()).unwrap();

    // Payload is refused until the prompt arrived
    assert_eq!(CommandError::Failed, driver.send_payload(b"hallo!").unwrap_err());

    driver.serial.inject(b"> ");
    assert_eq!(Err(nb::Error::WouldBlock), driver.poll());
    assert_eq!(CommandStatus::PromptReady, driver.command_state());

    // Oversized payloads are rejected without touching the wire
    assert_eq!(
        CommandError::OutOfMemory,
        driver.send_payload(&[b'x'; 257]).unwrap_err()
    );

    driver.send_payload(b"hallo!").unwrap();
    assert_eq!(
        vec!["AT+CIPSENDEX=0,2048\r\n", "hallo!\\0"],
        driver.serial.get_commands_as_strings()
    );

    driver.serial.inject(b"Recv 6 bytes\r\nSEND OK\r\n");
    assert_eq!(Ok(()), driver.poll());
    assert_eq!(6, driver.total_sent());
}

#[test]
fn test_send_fail_resolves_with_error() {
    let mut channel: RxChannel<1024> = RxChannel::new();
    let (producer, consumer) = channel.split();
    let mut driver: TestDriver =
        Driver::new(TestSerial::new(producer), MockTimer::monotonic(), consumer, Recorder::default());

    driver.serial.inject(b"0,CONNECT\r\n");
    driver.process();

    driver.issue(Command::send_request(0).unwrap()).unwrap();
    driver.serial.inject(b"> ");
    driver.process();
    driver.send_payload(b"data").unwrap();

    driver.serial.inject(b"SEND FAIL\r\n");
    assert_eq!(
        Err(nb::Error::Other(CommandError::Failed)),
        driver.poll()
    );
}

#[test]
fn test_send_terminators_ignored_for_other_commands() {
    let mut channel: RxChannel<1024> = RxChannel::new();
    let (producer, consumer) = channel.split();
    let mut driver: TestDriver =
        Driver::new(TestSerial::new(producer), MockTimer::monotonic(), consumer, Recorder::default());

    driver.issue(Command::probe()).unwrap();
    driver.serial.inject(b"SEND OK\r\nSEND FAIL\r\n");
    assert_eq!(Err(nb::Error::WouldBlock), driver.poll());

    driver.serial.inject(b"OK\r\n");
    assert_eq!(Ok(()), driver.poll());
}

#[test]
fn test_uart_reply_matched_before_line_end() {
    let mut channel: RxChannel<1024> = RxChannel::new();
    let (producer, consumer) = channel.split();
    let mut driver: TestDriver =
        Driver::new(TestSerial::new(producer), MockTimer::monotonic(), consumer, Recorder::default());

    driver.issue(Command::uart(9_600, false).unwrap()).unwrap();

    // The tail of the reply arrives garbled at the old baud rate
    driver.serial.inject(b"OK\r\xfe\x80\x11");
    assert_eq!(Ok(()), driver.poll());

    // The garbage was drained along the way
    driver.issue(Command::probe()).unwrap();
    assert_eq!(Err(nb::Error::WouldBlock), driver.poll());
    driver.serial.inject(b"OK\r\n");
    assert_eq!(Ok(()), driver.poll());
}

#[test]
fn test_abort_abandons_command() {
    let mut channel: RxChannel<1024> = RxChannel::new();
    let (producer, consumer) = channel.split();
    let mut driver: TestDriver =
        Driver::new(TestSerial::new(producer), MockTimer::monotonic(), consumer, Recorder::default());

    driver.issue(Command::probe()).unwrap();
    driver.abort();

    assert_eq!(CommandStatus::Idle, driver.command_state());
    assert_eq!(Ok(()), driver.poll());
    driver.issue(Command::scan()).unwrap();
}

#[test]
fn test_frame_delivered_to_callback() {
    let mut channel: RxChannel<1024> = RxChannel::new();
    let (producer, consumer) = channel.split();
    let mut driver: TestDriver =
        Driver::new(TestSerial::new(producer), MockTimer::monotonic(), consumer, Recorder::default());

    driver.serial.inject(b"2,CONNECT\r\n");
    driver.process();
    driver.set_data_callback(2, record_data).unwrap();

    driver.serial.inject(b"+IPD,2,5:hello");
    driver.process();

    assert_eq!(vec![(2, b"hello".to_vec())], driver.handler().data);
    assert_eq!(5, driver.link(2).unwrap().total_received());
    assert_eq!(5, driver.total_received());
    assert!(!driver.link(2).unwrap().more_pending());
    assert!(driver.link(2).unwrap().is_first_packet());
    assert_eq!(None, driver.link(2).unwrap().remote());
}

#[test]
fn test_frame_header_remote_recorded() {
    let mut channel: RxChannel<1024> = RxChannel::new();
    let (producer, consumer) = channel.split();
    let mut driver: TestDriver =
        Driver::new(TestSerial::new(producer), MockTimer::monotonic(), consumer, Recorder::default());

    driver.serial.inject(b"3,CONNECT\r\n");
    driver.process();
    driver.set_data_callback(3, record_data).unwrap();

    driver.serial.inject(b"+IPD,3,2,10.0.0.5,5000:hi");
    driver.process();

    assert_eq!(vec![(3, b"hi".to_vec())], driver.handler().data);
    let remote = driver.link(3).unwrap().remote().unwrap();
    assert_eq!("10.0.0.5", remote.0.to_string());
    assert_eq!(5000, remote.1);
}

#[test]
fn test_frame_interleaved_with_terminator() {
    let mut channel: RxChannel<1024> = RxChannel::new();
    let (producer, consumer) = channel.split();
    let mut driver: TestDriver =
        Driver::new(TestSerial::new(producer), MockTimer::monotonic(), consumer, Recorder::default());

    driver.serial.inject(b"0,CONNECT\r\n");
    driver.process();
    driver.set_data_callback(0, record_data).unwrap();

    driver.issue(Command::probe()).unwrap();
    driver.serial.inject(b"+IPD,0,5:helloOK\r\n");

    assert_eq!(Ok(()), driver.poll());
    assert_eq!(vec![(0, b"hello".to_vec())], driver.handler().data);
    // The payload bytes never reach the response record
    assert_eq!("", driver.response());
}

#[test]
fn test_frame_for_inactive_link_discarded() {
    let mut channel: RxChannel<1024> = RxChannel::new();
    let (producer, consumer) = channel.split();
    let mut driver: TestDriver =
        Driver::new(TestSerial::new(producer), MockTimer::monotonic(), consumer, Recorder::default());

    driver.issue(Command::probe()).unwrap();
    driver.serial.inject(b"+IPD,1,4:dataOK\r\n");

    // The stream stays in sync, the terminator still resolves
    assert_eq!(Ok(()), driver.poll());
    assert!(driver.handler().data.is_empty());
    assert_eq!(0, driver.total_received());
    assert_eq!(0, driver.link(1).unwrap().total_received());
}

#[test]
fn test_large_frame_delivered_in_chunks() {
    let mut channel: RxChannel<1024> = RxChannel::new();
    let (producer, consumer) = channel.split();
    let mut driver: TestDriver =
        Driver::new(TestSerial::new(producer), MockTimer::monotonic(), consumer, Recorder::default());

    driver.serial.inject(b"0,CONNECT\r\n");
    driver.process();
    driver.set_data_callback(0, record_data).unwrap();

    driver.serial.inject(b"+IPD,0,100:");
    driver.serial.inject(&[b'x'; 100]);
    driver.process();

    // Receive area holds 64 bytes, the frame arrives in two calls
    assert_eq!(2, driver.handler().data.len());
    assert_eq!((0, vec![b'x'; 64]), driver.handler().data[0]);
    assert_eq!((0, vec![b'x'; 36]), driver.handler().data[1]);
    assert_eq!(100, driver.link(0).unwrap().total_received());
    assert_eq!(100, driver.total_received());
}

#[test]
fn test_frame_split_across_polls() {
    let mut channel: RxChannel<1024> = RxChannel::new();
    let (producer, consumer) = channel.split();
    let mut driver: TestDriver =
        Driver::new(TestSerial::new(producer), MockTimer::monotonic(), consumer, Recorder::default());

    driver.serial.inject(b"0,CONNECT\r\n");
    driver.process();
    driver.set_data_callback(0, record_data).unwrap();

    driver.serial.inject(b"+IPD,0,8:abc");
    driver.process();

    // Counted at the header, delivered once complete
    assert!(driver.link(0).unwrap().more_pending());
    assert_eq!(8, driver.link(0).unwrap().total_received());
    assert!(driver.handler().data.is_empty());

    driver.serial.inject(b"defgh");
    driver.process();

    assert!(!driver.link(0).unwrap().more_pending());
    assert_eq!(vec![(0, b"abcdefgh".to_vec())], driver.handler().data);
}

#[test]
fn test_content_length_sniffed_from_first_packet() {
    let mut channel: RxChannel<1024> = RxChannel::new();
    let (producer, consumer) = channel.split();
    let mut driver: TestDriver =
        Driver::new(TestSerial::new(producer), MockTimer::monotonic(), consumer, Recorder::default());

    driver.serial.inject(b"0,CONNECT\r\n");
    driver.process();

    driver.serial.inject(b"+IPD,0,39:HTTP/1.1 200 OK\r\nContent-Length: 42\r\n\r\n");
    driver.process();
    assert_eq!(Some(42), driver.link(0).unwrap().content_length());

    // Later packets leave the sniffed value alone
    driver.serial.inject(b"+IPD,0,3:xyz");
    driver.process();
    assert!(!driver.link(0).unwrap().is_first_packet());
    assert_eq!(Some(42), driver.link(0).unwrap().content_length());
}

#[test]
fn test_peer_close_releases_link_once() {
    let mut channel: RxChannel<1024> = RxChannel::new();
    let (producer, consumer) = channel.split();
    let mut driver: TestDriver =
        Driver::new(TestSerial::new(producer), MockTimer::monotonic(), consumer, Recorder::default());

    driver.serial.inject(b"1,CONNECT\r\n1,CLOSED\r\n");
    driver.process();

    assert!(!driver.link(1).unwrap().is_active());
    assert_eq!(vec!["link 1 opened", "link 1 closed"], driver.handler().events);

    // The firmware repeats the notification at times
    driver.serial.inject(b"1,CLOSED\r\n");
    driver.process();
    assert_eq!(vec!["link 1 opened", "link 1 closed"], driver.handler().events);
}

#[test]
fn test_oversized_line_counter_exposed() {
    let mut channel: RxChannel<1024> = RxChannel::new();
    let (producer, consumer) = channel.split();
    let mut driver: TestDriver =
        Driver::new(TestSerial::new(producer), MockTimer::monotonic(), consumer, Recorder::default());

    driver.serial.inject(&[b'a'; 300]);
    driver.serial.inject(b"\r\n");
    driver.process();

    assert_eq!(1, driver.discarded_lines());
}
