use std::{fs, path::PathBuf};

use bebe::{
    run_on,
    transport::MockTransport,
    wire::{RwHeader, ACK, MAX_CHUNK, NACK, READY, RW_HEADER_LEN},
    Error, Link, Operation, Outcome, Phase, SettingsBuilder, Stage,
};

/// A scratch file removed when dropped.
struct Scratch(PathBuf);
impl Scratch {
    fn new(name: &str, content: &[u8]) -> Self {
        let path = std::env::temp_dir().join(format!("bebe-{}-{}", std::process::id(), name));
        fs::write(&path, content).unwrap();
        Scratch(path)
    }
}
impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.0);
    }
}

#[test]
fn full_session_over_a_sleepy_dut() {
    let image: Vec<u8> = (0..MAX_CHUNK + 2).map(|i| i as u8).collect();
    let file = Scratch::new("image.bin", &image);

    let mut dut = vec![0x00, READY, READY, READY, ACK];
    dut.extend_from_slice(&[ACK, ACK]); // two chunks
    dut.push(ACK); // immediate write
    dut.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]); // read
    dut.push(ACK); // jump
    let mut link = Link::new(MockTransport::new(&dut).with_read_limit(2));

    let settings = SettingsBuilder::new()
        .address(0x1000)
        .write_file(&file.0)
        .write_value(0xcafe, 2)
        .read_length(4)
        .jump(true)
        .finalize();
    let report = run_on(&mut link, &settings).unwrap();
    assert!(report.is_success());
    assert_eq!(link.phase(), Phase::Established);

    let end = 0x1000 + image.len() as u64;
    let ops: Vec<Operation> = report.entries.iter().map(|(op, _)| *op).collect();
    assert_eq!(
        ops,
        vec![
            Operation::WriteSource,
            Operation::WriteImmediate,
            Operation::Read,
            Operation::Jump
        ]
    );
    match &report.entries[2].1 {
        Outcome::Read { address, data } => {
            assert_eq!(*address, end);
            assert_eq!(data, &vec![0xde, 0xad, 0xbe, 0xef]);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(report.entries[3].1, Outcome::Jumped(address) if address == end));

    let transport = link.into_inner();
    let sent = transport.sent();
    assert_eq!(sent.len(), 6);
    assert_eq!(sent[0].bytes, b"GOBEARS!".to_vec());
    assert_eq!(sent[0].after_reading, 2);

    let first = RwHeader::from_bytes(&sent[1].bytes[1..]).unwrap();
    let second = RwHeader::from_bytes(&sent[2].bytes[1..]).unwrap();
    assert_eq!((first.address, first.length as usize), (0x1000, MAX_CHUNK));
    assert_eq!((second.address, second.length), (0x1000 + MAX_CHUNK as u64, 2));
    assert_eq!(&sent[1].bytes[1 + RW_HEADER_LEN..], &image[..MAX_CHUNK]);
    assert_eq!(&sent[2].bytes[1 + RW_HEADER_LEN..], &image[MAX_CHUNK..]);

    // The immediate write, the read and the jump all land at the end of the
    // file data.
    for frame in &sent[3..5] {
        assert_eq!(RwHeader::from_bytes(&frame.bytes[1..]).unwrap().address, end);
    }
    assert_eq!(sent[5].bytes[1..], end.to_be_bytes());
    assert_eq!(transport.remaining(), 0);
}

#[test]
fn no_wait_nocks_straight_away() {
    let mut link = Link::new(MockTransport::new(&[READY, ACK, 0x11]));
    let settings = SettingsBuilder::new()
        .skip_wait(true)
        .address(0x8000)
        .read_length(1)
        .finalize();
    let report = run_on(&mut link, &settings).unwrap();
    assert!(report.is_success());
    assert_eq!(link.into_inner().sent()[0].after_reading, 0);
}

#[test]
fn rejected_nock_runs_nothing() {
    let mut link = Link::new(MockTransport::new(&[READY, NACK, ACK]));
    let settings = SettingsBuilder::new().read_length(8).finalize();
    let err = run_on(&mut link, &settings).unwrap_err();
    assert!(matches!(
        err,
        Error::Protocol {
            stage: Stage::Nock,
            ..
        }
    ));
    assert_eq!(link.phase(), Phase::Failed);
    assert_eq!(link.into_inner().sent().len(), 1);
}

#[test]
fn refused_chunk_keeps_earlier_chunks_and_stops() {
    let image = vec![0x77; MAX_CHUNK * 2 + 5];
    let file = Scratch::new("refused.bin", &image);

    let mut link = Link::new(MockTransport::new(&[READY, ACK, ACK, NACK]));
    let settings = SettingsBuilder::new()
        .address(0x2000)
        .write_file(&file.0)
        .read_length(4)
        .jump(true)
        .finalize();
    let report = run_on(&mut link, &settings).unwrap();
    assert!(!report.is_success());
    assert_eq!(report.exit_code(), 1);
    assert_eq!(report.entries.len(), 1);
    assert!(matches!(
        report.failure(),
        Some(Error::Protocol {
            stage: Stage::Write,
            ..
        })
    ));
    // Magic plus the two chunks that were sent.
    assert_eq!(link.into_inner().sent().len(), 3);
}

#[test]
fn oversized_immediate_write_is_skipped() {
    let mut link = Link::new(MockTransport::new(&[READY, ACK, ACK]));
    let settings = SettingsBuilder::new()
        .write_value(u64::MAX, 9)
        .jump(true)
        .finalize();
    let report = run_on(&mut link, &settings).unwrap();
    assert!(report.is_success());
    assert!(matches!(
        report.entries[0],
        (
            Operation::WriteImmediate,
            Outcome::Skipped(Error::ImmediateLength(9))
        )
    ));
    let transport = link.into_inner();
    // Magic and the jump, nothing in between.
    assert_eq!(transport.sent().len(), 2);
    assert_eq!(transport.sent()[1].bytes[0], b'J');
}

#[test]
fn jump_nack_is_reported() {
    let mut link = Link::new(MockTransport::new(&[READY, ACK, NACK]));
    let settings = SettingsBuilder::new().jump(true).finalize();
    let report = run_on(&mut link, &settings).unwrap();
    assert_eq!(report.exit_code(), 1);
    assert!(matches!(
        report.failure(),
        Some(Error::Protocol {
            stage: Stage::Jump,
            ..
        })
    ));
}

#[test]
fn line_closing_mid_write_fails_the_run() {
    let image = vec![0x33; MAX_CHUNK + 1];
    let file = Scratch::new("closing.bin", &image);

    // Only the first chunk is acknowledged before the line goes quiet.
    let mut link = Link::new(MockTransport::new(&[READY, ACK, ACK]));
    let settings = SettingsBuilder::new()
        .address(0x4000)
        .write_file(&file.0)
        .read_length(4)
        .jump(true)
        .finalize();
    let report = run_on(&mut link, &settings).unwrap();
    assert_eq!(report.exit_code(), 1);
    assert_eq!(report.entries.len(), 1);
    assert!(matches!(
        report.entries[0],
        (Operation::WriteSource, Outcome::Failed(Error::Transport(_)))
    ));
    assert_eq!(link.into_inner().sent().len(), 3);
}
