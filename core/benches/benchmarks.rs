//! Performance benchmarks for the gossipd core

use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gossipd_core::*;
use std::sync::Arc;
use tokio_util::codec::Decoder;
use tokio_util::sync::CancellationToken;

fn benchmark_message_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("message_parsing");

    let messages = vec![
        "NICK alice",
        "USER alice 0 * :Alice Wonderland",
        ":alice!user@host PRIVMSG #channel :Hello world",
        ":server.example.com 001 alice :Welcome to the GossipNet IRC Network",
        "JOIN #channel",
        "PART #channel :Goodbye",
    ];

    for msg in messages {
        group.bench_with_input(BenchmarkId::from_parameter(msg), msg, |b, msg| {
            b.iter(|| Message::parse(black_box(msg)))
        });
    }

    group.finish();
}

fn benchmark_message_serialization(c: &mut Criterion) {
    let msg = Message::with_prefix(
        Prefix::User {
            nick: "alice".to_string(),
            user: "user".to_string(),
            host: "127.0.0.1".to_string(),
        },
        MessageType::PrivMsg,
        vec!["#channel".to_string(), "Hello world".to_string()],
    );

    c.bench_function("message_to_wire", |b| b.iter(|| black_box(&msg).to_wire()));
}

fn benchmark_codec(c: &mut Criterion) {
    let mut input = String::new();
    for i in 0..100 {
        input.push_str(&format!("PRIVMSG #channel :message number {}\r\n", i));
    }

    c.bench_function("codec_decode_100_lines", |b| {
        b.iter(|| {
            let mut codec = LineCodec::new();
            let mut buf = BytesMut::from(input.as_str());
            let mut count = 0;
            while let Ok(Some(_)) = codec.decode(&mut buf) {
                count += 1;
            }
            black_box(count)
        })
    });
}

fn benchmark_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry");

    group.bench_function("reserve_remove", |b| {
        let registry = Registry::new();
        let id = SessionId::new();
        b.iter(|| {
            registry.reserve(black_box("alice"), id).ok();
            registry.remove_session(id);
        })
    });

    group.bench_function("rename_round_trip", |b| {
        let registry = Registry::new();
        let id = SessionId::new();
        registry.reserve("alice", id).ok();
        b.iter(|| {
            registry.rename("alice", "alice_", id).ok();
            registry.rename("alice_", "alice", id).ok();
        })
    });

    group.bench_function("join_part_busy_channel", |b| {
        let registry = Registry::new();
        for _ in 0..500 {
            registry.join("#busy", &JoinRequest::new(SessionId::new(), "u!u@host", 20)).ok();
        }
        let id = SessionId::new();
        b.iter(|| {
            registry.join("#busy", &JoinRequest::new(id, "u!u@host", 20)).ok();
            registry.part("#busy", id).ok();
        })
    });

    group.finish();
}

fn benchmark_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");

    for members in [10usize, 100, 1000] {
        let registry = Arc::new(Registry::new());
        let router = Router::new(registry.clone());
        let mut receivers = Vec::new();
        let sender = SessionId::new();
        registry.join("#bench", &JoinRequest::new(sender, "u!u@host", 20)).ok();

        for _ in 0..members {
            let id = SessionId::new();
            let (queue, rx) = SendQueue::new(usize::MAX, CancellationToken::new());
            router.register(id, queue);
            registry.join("#bench", &JoinRequest::new(id, "u!u@host", 20)).ok();
            receivers.push(rx);
        }

        let msg = Message::new(
            MessageType::PrivMsg,
            vec!["#bench".to_string(), "hello".to_string()],
        );

        group.bench_with_input(BenchmarkId::from_parameter(members), &members, |b, _| {
            b.iter(|| {
                router.send_to_channel("#bench", sender, &msg).ok();
                for rx in receivers.iter_mut() {
                    while rx.try_recv().is_some() {}
                }
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_message_parsing,
    benchmark_message_serialization,
    benchmark_codec,
    benchmark_registry,
    benchmark_fan_out,
);
criterion_main!(benches);
