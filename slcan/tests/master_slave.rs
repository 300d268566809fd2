mod common;

use common::{Adapter, ManualClock, TestMaster, TestSlave, exchange, loop_back, pipe};
use futures_executor::LocalPool;
use futures_task::LocalSpawn;
use slcan::completion::{Completion, CompletionResult, Reply};
use slcan::config::{MasterConfig, SlaveConfig, TransportConfig};
use slcan::core::{BitRate, CanMessage, Error, ExtendedId, MessageMeta, StandardId, Status};
use slcan::master::Master;
use slcan::slave::{DeviceFlags, Slave};
use slcan::time::Duration;
use slcan::transport::Transport;
use std::boxed::Box;
use std::cell::Cell;
use std::rc::Rc;

fn engines<'a>(clock: &'a ManualClock, config: SlaveConfig) -> (TestMaster<'a>, TestSlave<'a>) {
    let (master_port, slave_port) = pipe();
    let master = Master::new(
        Transport::new(master_port, TransportConfig::default()),
        clock,
        MasterConfig::default(),
    );
    let slave = Slave::new(
        Transport::new(slave_port, TransportConfig::default()),
        clock,
        Adapter::default(),
        config,
    );
    (master, slave)
}

fn data_frame(id: u16, data: &[u8]) -> CanMessage {
    CanMessage::new_data(StandardId::new(id).unwrap(), data).unwrap()
}

#[test]
fn test_open_requires_bit_rate() {
    let open_early = Completion::new();
    let setup = Completion::new();
    let open = Completion::new();
    let status = Completion::new();
    let clock = ManualClock::new();
    let (mut master, mut slave) = engines(&clock, SlaveConfig::default());

    master.request_open(Some(&open_early)).unwrap();
    exchange(&mut master, &mut slave);
    assert_eq!(open_early.result(), Some(Err(Error::ExecFail)));

    master
        .request_setup_can_std(BitRate::Kbit50, Some(&setup))
        .unwrap();
    master.request_open(Some(&open)).unwrap();
    master.request_status(Some(&status)).unwrap();
    exchange(&mut master, &mut slave);

    assert_eq!(setup.result(), Some(Ok(Reply::Done)));
    assert_eq!(open.result(), Some(Ok(Reply::Done)));
    assert_eq!(status.result(), Some(Ok(Reply::Status(Status::empty()))));
    assert_eq!(slave.device().bit_rate, Some(BitRate::Kbit50));
    assert!(slave.device().opened);
    assert_eq!(
        *slave.transport().port().tap.borrow(),
        b"\x07\r\rF00\r"
    );
}

#[test]
fn test_poll_all_returns_looped_back_frame() {
    let sent = Completion::new();
    let polled = Completion::new();
    let clock = ManualClock::new();
    let (mut master, mut slave) = engines(&clock, SlaveConfig::default());

    master.request_setup_can_std(BitRate::Kbit500, None).unwrap();
    master.request_open(None).unwrap();
    let message = data_frame(0xA5, &[1, 2, 3, 4, 5, 6, 7, 8]);
    master.send_can_message(message, Some(&sent)).unwrap();
    exchange(&mut master, &mut slave);
    assert_eq!(sent.result(), Some(Ok(Reply::Done)));

    loop_back(&mut slave);
    slave.transport().port().tap.borrow_mut().clear();
    master.request_poll_all(Some(&polled)).unwrap();
    exchange(&mut master, &mut slave);

    assert_eq!(polled.result(), Some(Ok(Reply::Done)));
    assert_eq!(
        *slave.transport().port().tap.borrow(),
        b"t0A580102030405060708\rA\r"
    );
    assert_eq!(
        master.recv_can_message(),
        Some((message, MessageMeta::default()))
    );
    assert_eq!(master.recv_can_message(), None);
}

#[test]
fn test_auto_poll_pushes_frames() {
    let ack = Completion::new();
    let clock = ManualClock::new();
    let (mut master, mut slave) = engines(&clock, SlaveConfig::default());

    master.request_set_auto_poll(true, None).unwrap();
    master.request_set_timestamp(true, None).unwrap();
    master.request_setup_can_std(BitRate::Mbit1, None).unwrap();
    master.request_open(None).unwrap();
    exchange(&mut master, &mut slave);
    assert!(
        slave
            .flags()
            .contains(DeviceFlags::AUTO_POLL | DeviceFlags::TIMESTAMP | DeviceFlags::OPENED)
    );

    let extended = CanMessage::new_data(ExtendedId::new(0x1ABC_DEF0).unwrap(), &[9]).unwrap();
    master.send_can_message(extended, Some(&ack)).unwrap();
    exchange(&mut master, &mut slave);
    assert_eq!(ack.result(), Some(Ok(Reply::Done)));
    assert!(slave.transport().port().tap.borrow().ends_with(b"Z\r"));

    clock.advance(Duration::from_millis(120_500));
    loop_back(&mut slave);
    exchange(&mut master, &mut slave);

    let (message, meta) = master.recv_can_message().unwrap();
    assert_eq!(message, extended);
    assert_eq!(
        meta,
        MessageMeta {
            timestamp: Some(500),
            auto_poll: true
        }
    );
}

#[test]
fn test_pipelined_requests_with_pushed_frames() {
    let version = Completion::new();
    let serial = Completion::new();
    let clock = ManualClock::new();
    let mut config = SlaveConfig::default();
    config.auto_poll = true;
    config.serial_number = 0x1234;
    let (mut master, mut slave) = engines(&clock, config);

    master.request_setup_can_std(BitRate::Kbit125, None).unwrap();
    master.request_open(None).unwrap();
    exchange(&mut master, &mut slave);

    for id in 1..=3 {
        slave.send_can_message(data_frame(id, &[]), None).unwrap();
    }
    master.request_version(Some(&version)).unwrap();
    master.request_serial_number(Some(&serial)).unwrap();
    exchange(&mut master, &mut slave);

    assert_eq!(
        version.result(),
        Some(Ok(Reply::Version {
            hardware: 0x10,
            software: 0x10
        }))
    );
    assert_eq!(serial.result(), Some(Ok(Reply::SerialNumber(0x1234))));
    assert_eq!(master.received_count(), 3);
}

#[test]
fn test_silent_slave_times_out() {
    let status = Completion::new();
    let version = Completion::new();
    let clock = ManualClock::new();
    let (mut master, mut slave) = engines(&clock, SlaveConfig::default());

    master.request_status(Some(&status)).unwrap();
    master.poll().unwrap();
    clock.advance(Duration::from_millis(100));
    master.poll().unwrap();
    assert_eq!(status.result(), Some(Err(Error::Timeout)));

    // the late ERR finds nothing to answer
    exchange(&mut master, &mut slave);
    assert_eq!(status.result(), Some(Err(Error::Timeout)));
    assert_eq!(master.pending_requests(), 0);

    master.request_version(Some(&version)).unwrap();
    exchange(&mut master, &mut slave);
    assert!(matches!(version.result(), Some(Ok(Reply::Version { .. }))));
}

#[test]
fn test_listen_only_refuses_transmit() {
    let sent = Completion::new();
    let clock = ManualClock::new();
    let (mut master, mut slave) = engines(&clock, SlaveConfig::default());

    master.request_setup_can_std(BitRate::Kbit250, None).unwrap();
    master.request_listen(None).unwrap();
    master.send_can_message(data_frame(7, &[7]), Some(&sent)).unwrap();
    exchange(&mut master, &mut slave);

    assert_eq!(sent.result(), Some(Err(Error::ExecFail)));
    assert!(slave.device().listen_only);
    assert_eq!(slave.recv_can_message(), None);
}

#[test]
fn test_flush_drives_both_ends() {
    let clock = ManualClock::new();
    let (mut master, mut slave) = engines(&clock, SlaveConfig::default());

    master.request_setup_can_std(BitRate::Kbit100, None).unwrap();
    master.request_open(None).unwrap();
    for id in 0..4 {
        master.send_can_message(data_frame(id, &[0xFF]), None).unwrap();
    }
    let res = master.flush(Duration::from_millis(10), || slave.poll().unwrap());
    assert_eq!(res, Ok(()));

    let mut received = 0;
    while slave.recv_can_message().is_some() {
        received += 1;
    }
    assert_eq!(received, 4);
}

#[test]
fn test_await_completion() {
    let mut executor = LocalPool::new();
    let spawner = executor.spawner();

    let completion: &'static Completion = Box::leak(Box::new(Completion::new()));
    let result: Rc<Cell<Option<CompletionResult>>> = Default::default();

    let task_result = result.clone();
    spawner
        .spawn_local_obj(
            Box::new(async move {
                task_result.set(Some(completion.wait().await));
            })
            .into(),
        )
        .unwrap();

    let clock = ManualClock::new();
    let (mut master, mut slave) = engines(&clock, SlaveConfig::default());
    master.request_version(Some(completion)).unwrap();

    executor.run_until_stalled();
    assert_eq!(result.get(), None);

    exchange(&mut master, &mut slave);
    executor.run_until_stalled();
    assert_eq!(
        result.get(),
        Some(Ok(Reply::Version {
            hardware: 0x10,
            software: 0x10
        }))
    );
}
