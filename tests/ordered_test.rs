mod common;

use common::{TestSocket, peer_addr};
use rand::seq::SliceRandom;
use rand::{SeedableRng, rngs};
use reliable_dgram::{BufferWriter, Config, PacketSorter, Reliability};
use std::time::Instant;

const ACK: u8 = 1;

fn frame_ordered(id: u64, body: &[u8]) -> Vec<u8> {
    let mut writer = BufferWriter::new();
    writer.write_u8(Reliability::ReliableOrdered as u8);
    writer.write_u64(id);
    writer.write_bytes(body);
    writer.into_vec()
}

fn unguarded_sorter(now: Instant) -> PacketSorter<u8> {
    let config = Config {
        stale_startup_guard: false,
        ..Config::default()
    };

    PacketSorter::new(peer_addr(), ACK, &config, now)
}

#[test]
fn in_order_delivery_is_immediate() {
    let now = Instant::now();
    let socket = TestSocket::new();
    let mut sorter = unguarded_sorter(now);

    for id in 0..5u64 {
        let body = vec![id as u8];
        let out = sorter
            .sort_packet(&socket, &frame_ordered(id, &body), now)
            .unwrap();
        assert_eq!(out, vec![body]);
    }
}

#[test]
fn gap_stalls_delivery_until_filled() {
    let now = Instant::now();
    let socket = TestSocket::new();
    let mut sorter = unguarded_sorter(now);

    let out = sorter
        .sort_packet(&socket, &frame_ordered(0, b"0"), now)
        .unwrap();
    assert_eq!(out, vec![b"0".to_vec()]);

    // 1 is missing, so 2 and 3 back up
    for (id, body) in [(2u64, b"2"), (3, b"3")] {
        let out = sorter
            .sort_packet(&socket, &frame_ordered(id, body), now)
            .unwrap();
        assert!(out.is_empty(), "id {id} must wait for the gap");
    }

    // filling the gap releases the contiguous run in id order
    let out = sorter
        .sort_packet(&socket, &frame_ordered(1, b"1"), now)
        .unwrap();
    assert_eq!(out, vec![b"1".to_vec(), b"2".to_vec(), b"3".to_vec()]);
}

#[test]
fn duplicates_are_dropped_everywhere() {
    let now = Instant::now();
    let socket = TestSocket::new();
    let mut sorter = unguarded_sorter(now);

    // duplicate of a backed-up (not yet delivered) packet
    sorter
        .sort_packet(&socket, &frame_ordered(1, b"1"), now)
        .unwrap();
    let out = sorter
        .sort_packet(&socket, &frame_ordered(1, b"1"), now)
        .unwrap();
    assert!(out.is_empty());

    let out = sorter
        .sort_packet(&socket, &frame_ordered(0, b"0"), now)
        .unwrap();
    assert_eq!(out, vec![b"0".to_vec(), b"1".to_vec()]);

    // duplicate of an already delivered packet
    for id in [0u64, 1] {
        let out = sorter
            .sort_packet(&socket, &frame_ordered(id, b"x"), now)
            .unwrap();
        assert!(out.is_empty(), "delivered id {id} must not repeat");
    }

    // every arrival was still acked
    assert_eq!(socket.sent_count(), 5);
}

#[test]
fn any_permutation_with_duplicates_delivers_in_order() {
    const MESSAGES: u64 = 64;

    let now = Instant::now();
    let socket = TestSocket::new();
    let mut rng = rngs::SmallRng::seed_from_u64(0x0ddba11);

    for _ in 0..50 {
        let mut sorter = unguarded_sorter(now);

        let mut packets: Vec<u64> = (0..MESSAGES).collect();
        // duplicates interspersed
        packets.extend((0..MESSAGES).step_by(3));
        packets.shuffle(&mut rng);

        let mut delivered = Vec::new();

        for id in packets {
            let body = id.to_le_bytes();
            let out = sorter
                .sort_packet(&socket, &frame_ordered(id, &body), now)
                .unwrap();

            for payload in out {
                delivered.push(u64::from_le_bytes(payload.try_into().unwrap()));
            }
        }

        let expected: Vec<u64> = (0..MESSAGES).collect();
        assert_eq!(delivered, expected, "must deliver every id exactly once, in order");
    }
}
