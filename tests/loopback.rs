//! End-to-end tests over real loopback UDP sockets.
//!
//! Each test binds `tokio::net::UdpSocket`s on `127.0.0.1:0`, runs the motors
//! node in a background task, and drives it from a controller-side
//! `ReliableSender` or `Controller`.

use std::net::SocketAddr;
use std::time::Duration;

use motor_link::command::Direction;
use motor_link::config::RetryPolicy;
use motor_link::controller::{Controller, ControllerStats};
use motor_link::motor::RecordingMotor;
use motor_link::packet::Frame;
use motor_link::receiver::{CommandReceiver, ReceiverStats};
use motor_link::sender::{ReliableSender, SendError};
use motor_link::sequence::Sequence;
use motor_link::socket::{Transport, UdpTransport};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn bind_loopback() -> UdpTransport {
    UdpTransport::bind("127.0.0.1:0".parse::<SocketAddr>().unwrap())
        .await
        .expect("bind loopback socket")
}

/// Start a motors node on loopback; returns its address and task handle.
async fn spawn_motors(
    motor: RecordingMotor,
    echo: bool,
    cancel: CancellationToken,
) -> (SocketAddr, JoinHandle<ReceiverStats>) {
    let transport = bind_loopback().await;
    let addr = transport.local_addr();
    let mut receiver = CommandReceiver::new(transport, motor)
        .with_idle_timeout(Duration::from_millis(100))
        .with_echo_payload(echo);
    let task = tokio::spawn(async move { receiver.run(&cancel).await });
    (addr, task)
}

fn policy(timeout_ms: u64, attempts: u32) -> RetryPolicy {
    RetryPolicy::new(Duration::from_millis(timeout_ms), attempts).unwrap()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// Three commands on a clean link: sequences alternate from 0 and each effect
/// is applied once, in order.
#[tokio::test]
async fn commands_are_applied_in_order() {
    let motor = RecordingMotor::new();
    let cancel = CancellationToken::new();
    let (motors_addr, motors_task) = spawn_motors(motor.clone(), false, cancel.clone()).await;

    let mut sender = ReliableSender::new(bind_loopback().await, motors_addr, policy(1000, 3));
    let mut sequences = Vec::new();
    for direction in [Direction::Clockwise, Direction::Stop, Direction::CounterClockwise] {
        let d = tokio::time::timeout(
            Duration::from_secs(5),
            sender.deliver(direction, b"", &cancel),
        )
        .await
        .expect("deliver timed out")
        .expect("deliver failed");
        assert_eq!(d.attempts, 1);
        sequences.push(d.sequence);
    }

    cancel.cancel();
    let stats = motors_task.await.expect("motors task panicked");

    assert_eq!(sequences, [Sequence::Zero, Sequence::One, Sequence::Zero]);
    assert_eq!(
        motor.applied(),
        [Direction::Clockwise, Direction::Stop, Direction::CounterClockwise]
    );
    assert_eq!(stats.applied, 3);
    assert_eq!(stats.duplicates, 0);
}

/// A motors node that never answers: the sender transmits the same bytes
/// `max_attempts` times and then gives up.
#[tokio::test]
async fn silent_peer_exhausts_attempts() {
    let silent = bind_loopback().await;
    let mut sender = ReliableSender::new(bind_loopback().await, silent.local_addr(), policy(50, 3));

    let err = sender
        .deliver(Direction::Clockwise, b"", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SendError::DeliveryFailed {
            sequence: Sequence::Zero,
            attempts: 3
        }
    ));

    let mut copies = Vec::new();
    while let Some((bytes, _)) = silent.recv_timeout(Duration::from_millis(50)).await.unwrap() {
        copies.push(bytes);
    }
    assert_eq!(copies.len(), 3);
    assert!(copies.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(
        Frame::decode(&copies[0]).unwrap(),
        Frame::command(Sequence::Zero, Direction::Clockwise, Vec::new())
    );
}

/// A command delivered twice (as after a lost ACK) moves the motor once but
/// is acknowledged both times.
#[tokio::test]
async fn repeated_command_is_acked_but_applied_once() {
    let motor = RecordingMotor::new();
    let cancel = CancellationToken::new();
    let (motors_addr, motors_task) = spawn_motors(motor.clone(), true, cancel.clone()).await;

    let raw = bind_loopback().await;
    let bytes = Frame::command(Sequence::Zero, Direction::CounterClockwise, b"go".to_vec())
        .encode()
        .unwrap();
    raw.send_to(&bytes, motors_addr).await.unwrap();
    raw.send_to(&bytes, motors_addr).await.unwrap();

    let mut acks = Vec::new();
    while acks.len() < 2 {
        let (reply, src) = raw
            .recv_timeout(Duration::from_secs(2))
            .await
            .unwrap()
            .expect("missing ACK");
        assert_eq!(src, motors_addr);
        acks.push(Frame::decode(&reply).unwrap());
    }

    cancel.cancel();
    let stats = motors_task.await.unwrap();

    for ack in &acks {
        assert!(ack.acknowledges(Sequence::Zero));
        assert_eq!(ack.payload, b"go");
    }
    assert_eq!(motor.applied(), [Direction::CounterClockwise]);
    assert_eq!(stats.applied, 1);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(stats.acks_sent, 2);
}

/// Garbage, oversized and both-flags datagrams never reach the motor; the
/// node keeps serving afterwards.
#[tokio::test]
async fn bad_datagrams_do_not_stop_the_node() {
    let motor = RecordingMotor::new();
    let cancel = CancellationToken::new();
    let (motors_addr, motors_task) = spawn_motors(motor.clone(), false, cancel.clone()).await;

    let raw = bind_loopback().await;
    raw.send_to(&[0xff; 4], motors_addr).await.unwrap();
    let mut oversized = Frame::command(Sequence::Zero, Direction::Stop, Vec::new())
        .encode()
        .unwrap();
    oversized.resize(1500, 0);
    raw.send_to(&oversized, motors_addr).await.unwrap();
    raw.send_to(&[0, 1, 0, 0, 0, 0, 0, 1, 0, 1], motors_addr).await.unwrap();

    // The invalid command is still acknowledged.
    let (reply, _) = raw
        .recv_timeout(Duration::from_secs(2))
        .await
        .unwrap()
        .expect("missing ACK for invalid command");
    assert!(Frame::decode(&reply).unwrap().acknowledges(Sequence::Zero));

    let mut sender = ReliableSender::new(raw, motors_addr, policy(1000, 3));
    sender
        .deliver(Direction::Clockwise, b"", &cancel)
        .await
        .expect("node stopped serving");

    cancel.cancel();
    let stats = motors_task.await.unwrap();
    assert_eq!(motor.applied(), [Direction::Clockwise]);
    assert_eq!(stats.malformed, 2);
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.applied, 1);
}

/// Full controller loop against a motors node, driven by scripted input.
#[tokio::test]
async fn controller_drives_motors_over_udp() {
    let motor = RecordingMotor::new();
    let cancel = CancellationToken::new();
    let (motors_addr, motors_task) = spawn_motors(motor.clone(), false, cancel.clone()).await;

    let mut script = vec![
        Direction::Clockwise,
        Direction::Clockwise,
        Direction::CounterClockwise,
        Direction::CounterClockwise,
    ]
    .into_iter();
    let input = move || script.next().unwrap_or(Direction::Stop);
    let sender = ReliableSender::new(bind_loopback().await, motors_addr, policy(1000, 3));
    let mut controller = Controller::new(sender, input, Duration::from_millis(2), 2);

    let watcher = {
        let motor = motor.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            while motor.applied().len() < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        })
    };

    let stats = tokio::time::timeout(Duration::from_secs(5), controller.run(&cancel))
        .await
        .expect("controller did not stop");
    watcher.await.unwrap();
    motors_task.await.unwrap();

    assert_eq!(
        motor.applied(),
        [Direction::Clockwise, Direction::CounterClockwise, Direction::Stop]
    );
    assert_eq!(
        stats,
        ControllerStats {
            delivered: 3,
            failed: 0
        }
    );
}

/// The motors loop returns promptly once cancelled, even mid-wait.
#[tokio::test]
async fn motors_node_stops_on_cancel() {
    let cancel = CancellationToken::new();
    let (_, motors_task) = spawn_motors(RecordingMotor::new(), false, cancel.clone()).await;

    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();
    let stats = tokio::time::timeout(Duration::from_secs(2), motors_task)
        .await
        .expect("motors node did not stop")
        .unwrap();
    assert_eq!(stats, ReceiverStats::default());
}
