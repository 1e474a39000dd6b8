//! Integration tests for the gossipd core over real TCP connections

mod common;

use common::*;
use std::time::Duration;

/// Both clients end up in `channel` with nothing left unread
async fn join_together(first: &mut TestClient, second: &mut TestClient, channel: &str) {
    first.send(&format!("JOIN {}", channel)).await;
    first.expect(|l| l.contains(" 366 ")).await;
    second.send(&format!("JOIN {}", channel)).await;
    second.expect(|l| l.contains(" 366 ")).await;
    first.expect(|l| l.contains(" JOIN ")).await;
}

#[tokio::test]
async fn test_channel_broadcast_two_senders() {
    let (_server, addr) = start_server(test_config()).await;
    let mut user1 = TestClient::register(addr, "user1").await;
    let mut user2 = TestClient::register(addr, "user2").await;

    join_together(&mut user1, &mut user2, "#testchannel").await;

    user1.send("PRIVMSG #testchannel :Hello, World!").await;
    assert!(user1.sync().await.is_empty());
    let received = user2.recv().await;
    assert!(received.ends_with("PRIVMSG #testchannel :Hello, World!"));
    assert!(received.starts_with(":user1!"));

    user2.send("PRIVMSG #testchannel :This is another message.").await;
    assert!(user2.sync().await.is_empty());
    let received = user1.recv().await;
    assert!(received.ends_with("PRIVMSG #testchannel :This is another message."));
    assert!(received.starts_with(":user2!"));

    // Exactly one delivery each
    assert!(user1.sync().await.is_empty());
    assert!(user2.sync().await.is_empty());
}

#[tokio::test]
async fn test_channel_broadcast_single_sender() {
    let (_server, addr) = start_server(test_config()).await;
    let mut user1 = TestClient::register(addr, "user1").await;
    let mut user2 = TestClient::register(addr, "user2").await;

    join_together(&mut user1, &mut user2, "#testchannel").await;

    user1.send("PRIVMSG #testchannel :Hello, World!").await;
    assert!(user1.sync().await.is_empty());

    let lines = user2.sync().await;
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with(":Hello, World!"));
}

#[tokio::test]
async fn test_nick_change_dual_notification() {
    let (_server, addr) = start_server(test_config()).await;
    let mut user1 = TestClient::register(addr, "user1").await;
    let mut user2 = TestClient::register(addr, "user2").await;

    join_together(&mut user1, &mut user2, "#testchannel").await;

    user1.send("NICK user1_new").await;

    let own = user1.recv().await;
    assert!(own.starts_with(":user1!"));
    assert!(own.ends_with("NICK user1_new"));

    let seen = user2.recv().await;
    assert_eq!(seen, own);

    // The new name is now the one that routes
    user2.send("PRIVMSG user1_new :still there?").await;
    assert!(user1.recv().await.ends_with("PRIVMSG user1_new :still there?"));
}

#[tokio::test]
async fn test_nickname_uniqueness_conflict() {
    let (_server, addr) = start_server(test_config()).await;
    let mut user1 = TestClient::register(addr, "user1").await;
    let mut user2 = TestClient::register(addr, "user2").await;

    user2.send("NICK user1").await;
    assert_eq!(
        user2.recv().await,
        ":irc.test 433 user2 user1 :Nickname is already in use"
    );

    // user2 keeps its name, user1 is untouched
    user1.send("PRIVMSG user2 :hi").await;
    assert!(user2.recv().await.ends_with("PRIVMSG user2 hi"));
    assert!(user1.sync().await.is_empty());
}

#[tokio::test]
async fn test_part_cleanup() {
    let (_server, addr) = start_server(test_config()).await;
    let mut user1 = TestClient::register(addr, "user1").await;
    let mut user2 = TestClient::register(addr, "user2").await;

    join_together(&mut user1, &mut user2, "#testchannel").await;

    user1.send("PART #testchannel").await;
    assert!(user1.recv().await.ends_with("PART #testchannel"));
    let part = user2.recv().await;
    assert!(part.starts_with(":user1!"));
    assert!(part.ends_with("PART #testchannel"));

    user2.send("PRIVMSG #testchannel :anyone?").await;
    assert!(user2.sync().await.is_empty());
    assert!(user1.sync().await.is_empty());
}

#[tokio::test]
async fn test_quit_cleanup_frees_nickname() {
    let (server, addr) = start_server(test_config()).await;
    let mut user1 = TestClient::register(addr, "user1").await;
    let mut user2 = TestClient::register(addr, "user2").await;

    join_together(&mut user1, &mut user2, "#testchannel").await;

    user1.send("QUIT :bye now").await;
    let lines = user1.until_closed().await;
    assert!(lines
        .last()
        .unwrap()
        .starts_with("ERROR :Closing Link: 127.0.0.1 (bye now)"));

    let quit = user2.expect(|l| l.contains(" QUIT ")).await;
    assert!(quit.starts_with(":user1!"));
    assert!(quit.ends_with("QUIT :bye now"));

    let state = server.state();
    assert!(state.registry.lookup("user1").is_none());
    assert_eq!(state.registry.names("#testchannel").unwrap(), vec!["user2"]);

    // Immediately reusable
    let _again = TestClient::register(addr, "user1").await;
}

#[tokio::test]
async fn test_disconnect_without_quit_is_implicit_quit() {
    let (_server, addr) = start_server(test_config()).await;
    let mut user1 = TestClient::register(addr, "user1").await;
    let mut user2 = TestClient::register(addr, "user2").await;

    join_together(&mut user1, &mut user2, "#testchannel").await;

    drop(user1);

    let quit = user2.expect(|l| l.contains(" QUIT ")).await;
    assert!(quit.starts_with(":user1!"));
}

#[tokio::test]
async fn test_concurrent_claims_have_one_winner() {
    let (_server, addr) = start_server(test_config()).await;
    let mut clients = Vec::new();
    for i in 0..6 {
        clients.push(TestClient::register(addr, &format!("racer{}", i)).await);
    }

    // Every client races for the same name
    for client in clients.iter_mut() {
        client.send("NICK winner").await;
    }

    let mut winners = 0;
    let mut losers = 0;
    for client in clients.iter_mut() {
        let line = client.recv().await;
        match command_of(&line) {
            "NICK" => winners += 1,
            "433" => losers += 1,
            other => panic!("unexpected reply {}: {}", other, line),
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(losers, 5);
}

#[tokio::test]
async fn test_registration_then_claim_race() {
    let (server, addr) = start_server(test_config()).await;
    let mut renamer = TestClient::register(addr, "renamer").await;
    let mut newcomer = TestClient::connect(addr).await;

    renamer.send("NICK prize").await;
    newcomer.send("NICK prize").await;
    newcomer.send("USER n 0 * :N").await;

    let renamed = renamer.recv().await;
    let claimed = newcomer.recv().await;
    let rename_won = command_of(&renamed) == "NICK";
    let claim_won = command_of(&claimed) == "001";
    assert!(rename_won ^ claim_won, "{} / {}", renamed, claimed);

    let owner = server.state().registry.lookup("prize");
    assert!(owner.is_some());
}

#[tokio::test]
async fn test_overlong_line_recovers() {
    let mut config = test_config();
    config.connection.max_line_length = 64;
    let (_server, addr) = start_server(config).await;
    let mut client = TestClient::register(addr, "user1").await;

    let long = format!("PRIVMSG user1 :{}", "x".repeat(200));
    client.send(&long).await;
    assert_eq!(client.recv().await, ":irc.test 417 user1 :Input line was too long");

    // The connection survives and the tail was discarded
    assert!(client.sync().await.is_empty());
}

#[tokio::test]
async fn test_excess_violations_close_connection() {
    let mut config = test_config();
    config.connection.max_violations = 1;
    let (_server, addr) = start_server(config).await;
    let mut client = TestClient::register(addr, "user1").await;

    client.send(":prefix.only").await;
    client.send(":prefix.only").await;
    let lines = client.until_closed().await;
    assert!(lines
        .last()
        .unwrap()
        .ends_with("(Excess protocol violations)"));
}

#[tokio::test]
async fn test_partial_writes_are_reassembled() {
    let (_server, addr) = start_server(test_config()).await;
    let mut client = TestClient::connect(addr).await;

    client.send_raw(b"NI").await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    client.send_raw(b"CK alice\r\nUSER alice 0 * ").await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    client.send_raw(b":Alice\n").await;

    let welcome = client.recv().await;
    assert!(welcome.starts_with(":irc.test 001 alice "));
}

#[tokio::test]
async fn test_registration_timeout() {
    let mut config = test_config();
    config.connection.registration_timeout = 1;
    let (_server, addr) = start_server(config).await;
    let mut client = TestClient::connect(addr).await;

    client.send("NICK slowpoke").await;
    let lines = client.until_closed().await;
    assert_eq!(
        lines.last().unwrap(),
        "ERROR :Closing Link: 127.0.0.1 (Registration timeout)"
    );
}

#[tokio::test]
async fn test_ping_timeout() {
    let mut config = test_config();
    config.connection.ping_interval = 1;
    config.connection.ping_timeout = 2;
    let (_server, addr) = start_server(config).await;
    let mut client = TestClient::register(addr, "idle").await;

    assert_eq!(client.recv().await, "PING irc.test");
    let lines = client.until_closed().await;
    assert_eq!(
        lines.last().unwrap(),
        "ERROR :Closing Link: 127.0.0.1 (Ping timeout)"
    );
}

#[tokio::test]
async fn test_pong_keeps_session_alive() {
    let mut config = test_config();
    config.connection.ping_interval = 1;
    config.connection.ping_timeout = 2;
    let (_server, addr) = start_server(config).await;
    let mut client = TestClient::register(addr, "awake").await;

    for _ in 0..3 {
        assert_eq!(client.recv().await, "PING irc.test");
        client.send("PONG irc.test").await;
    }
    assert!(client.sync().await.is_empty());
}

#[tokio::test]
async fn test_shutdown_closes_sessions() {
    let (server, addr) = start_server(test_config()).await;
    let mut client = TestClient::register(addr, "user1").await;

    server.shutdown();
    client.until_closed().await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(server.state().registry.lookup("user1").is_none());
    assert_eq!(server.state().stats.current_connections(), 0);
}

#[tokio::test]
async fn test_slow_consumer_is_disconnected() {
    let mut config = test_config();
    config.connection.sendq_bytes = 16 * 1024;
    let (server, addr) = start_server(config).await;
    let mut flooder = TestClient::register(addr, "flooder").await;
    let mut slow = TestClient::register(addr, "slow").await;
    let mut watcher = TestClient::register(addr, "watcher").await;

    for client in [&mut flooder, &mut slow, &mut watcher] {
        client.send("JOIN #flood").await;
        client.expect(|l| l.contains(" 366 ")).await;
    }
    flooder.sync().await;
    watcher.sync().await;

    // The watcher keeps reading; `slow` never reads again
    let quit = tokio::spawn(async move { watcher.expect(|l| l.contains(" QUIT ")).await });

    let line = format!("PRIVMSG #flood :{}\r\n", "x".repeat(400));
    let batch = line.repeat(100);
    for _ in 0..1000 {
        if quit.is_finished() {
            break;
        }
        flooder.send_raw(batch.as_bytes()).await;
        tokio::task::yield_now().await;
    }

    let quit = quit.await.unwrap();
    assert!(quit.starts_with(":slow!"), "{}", quit);
    assert!(quit.ends_with("QUIT :SendQ exceeded"), "{}", quit);

    // Whatever the kernel buffered is readable, then the socket closes
    slow.until_closed().await;
    assert!(server.state().registry.lookup("slow").is_none());
    assert_eq!(
        server.state().registry.names("#flood").unwrap(),
        vec!["@flooder", "watcher"]
    );
}
