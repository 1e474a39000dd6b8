//! Tests for command handling and numeric replies over TCP

mod common;

use common::*;
use gossipd_core::*;

#[tokio::test]
async fn test_nick_command_parsing() {
    let msg = Message::parse("NICK :alice").unwrap();
    assert_eq!(msg.command, MessageType::Nick);
    assert_eq!(msg.param(0), Some("alice"));

    let msg = Message::parse("nick bob").unwrap();
    assert_eq!(msg.command, MessageType::Nick);
}

#[tokio::test]
async fn test_registration_replies() {
    let (_server, addr) = start_server(test_config()).await;
    let mut client = TestClient::connect(addr).await;

    client.send("CAP LS 302").await;
    client.send("NICK alice").await;
    client.send("USER alice 0 * :Alice").await;

    let mut codes = Vec::new();
    loop {
        let line = client.recv().await;
        assert!(line.starts_with(":irc.test "), "{}", line);
        let code = command_of(&line).to_string();
        let done = code == "376";
        codes.push(code);
        if done {
            break;
        }
    }
    assert_eq!(codes, vec!["001", "002", "003", "004", "375", "372", "376"]);
}

#[tokio::test]
async fn test_no_motd_reply() {
    let mut config = test_config();
    config.server.motd.clear();
    let (_server, addr) = start_server(config).await;
    let mut client = TestClient::connect(addr).await;

    client.send("NICK alice").await;
    client.send("USER alice 0 * :Alice").await;
    let line = client.expect(|l| command_of(l).starts_with('4') || command_of(l) == "376").await;
    assert_eq!(line, ":irc.test 422 alice :MOTD File is missing");
}

#[tokio::test]
async fn test_not_registered() {
    let (_server, addr) = start_server(test_config()).await;
    let mut client = TestClient::connect(addr).await;

    client.send("PRIVMSG #x :hi").await;
    assert_eq!(client.recv().await, ":irc.test 451 * :You have not registered");
    client.send("WHATEVER").await;
    assert_eq!(client.recv().await, ":irc.test 451 * :You have not registered");
}

#[tokio::test]
async fn test_error_numerics() {
    let (_server, addr) = start_server(test_config()).await;
    let mut alice = TestClient::register(addr, "alice").await;
    let _bob = TestClient::register(addr, "bob").await;

    let cases = [
        ("PRIVMSG nobody :hi", "401"),
        ("PRIVMSG #nowhere :hi", "403"),
        ("PRIVMSG", "411"),
        ("PRIVMSG bob", "412"),
        ("BOGUS", "421"),
        ("NICK", "431"),
        ("NICK 1bad", "432"),
        ("NICK bob", "433"),
        ("PART #nowhere", "403"),
        ("JOIN", "461"),
        ("USER a b c :d", "462"),
    ];

    for (command, expected) in cases {
        alice.send(command).await;
        let line = alice.recv().await;
        assert_eq!(command_of(&line), expected, "{} -> {}", command, line);
    }
}

#[tokio::test]
async fn test_not_on_channel() {
    let (_server, addr) = start_server(test_config()).await;
    let mut alice = TestClient::register(addr, "alice").await;
    let mut bob = TestClient::register(addr, "bob").await;

    bob.send("JOIN #bobs").await;
    bob.expect(|l| l.contains(" 366 ")).await;

    alice.send("PART #bobs").await;
    assert_eq!(
        alice.recv().await,
        ":irc.test 442 alice #bobs :You're not on that channel"
    );
    alice.send("PRIVMSG #bobs :let me in").await;
    assert_eq!(command_of(&alice.recv().await), "442");
    alice.send("TOPIC #bobs :mine now").await;
    assert_eq!(command_of(&alice.recv().await), "442");

    assert!(bob.sync().await.is_empty());
}

#[tokio::test]
async fn test_too_many_channels() {
    let mut config = test_config();
    config.limits.max_channels_per_client = 2;
    let (_server, addr) = start_server(config).await;
    let mut alice = TestClient::register(addr, "alice").await;

    alice.send("JOIN #a,#b").await;
    alice.expect(|l| l.contains(" 366 alice #b ")).await;
    alice.send("JOIN #c").await;
    assert_eq!(
        alice.recv().await,
        ":irc.test 405 alice #c :You have joined too many channels"
    );
}

#[tokio::test]
async fn test_topic_commands() {
    let (_server, addr) = start_server(test_config()).await;
    let mut alice = TestClient::register(addr, "alice").await;
    let mut bob = TestClient::register(addr, "bob").await;

    alice.send("JOIN #rust").await;
    alice.expect(|l| l.contains(" 366 ")).await;
    alice.send("TOPIC #rust").await;
    assert_eq!(alice.recv().await, ":irc.test 331 alice #rust :No topic is set");

    alice.send("TOPIC #rust :Fearless concurrency").await;
    assert!(alice.recv().await.ends_with("TOPIC #rust :Fearless concurrency"));

    bob.send("JOIN #rust").await;
    let topic = bob.expect(|l| command_of(l) == "332").await;
    assert_eq!(topic, ":irc.test 332 bob #rust :Fearless concurrency");
}

#[tokio::test]
async fn test_names_ison_lusers() {
    let (_server, addr) = start_server(test_config()).await;
    let mut alice = TestClient::register(addr, "alice").await;
    let mut bob = TestClient::register(addr, "bob").await;

    alice.send("JOIN #rust").await;
    alice.expect(|l| l.contains(" 366 ")).await;
    bob.send("JOIN #rust").await;
    bob.expect(|l| l.contains(" 366 ")).await;

    alice.send("NAMES #rust").await;
    alice.expect(|l| command_of(l) == "353").await;
    alice.send("ISON bob nobody").await;
    assert_eq!(alice.expect(|l| command_of(l) == "303").await, ":irc.test 303 alice bob");

    alice.send("LUSERS").await;
    let users = alice.recv().await;
    assert_eq!(users, ":irc.test 251 alice :There are 2 users and 0 invisible on 1 servers");
    assert_eq!(alice.recv().await, ":irc.test 254 alice 1 :channels formed");
    assert_eq!(command_of(&alice.recv().await), "255");
}

#[tokio::test]
async fn test_notice_is_silent() {
    let (_server, addr) = start_server(test_config()).await;
    let mut alice = TestClient::register(addr, "alice").await;

    alice.send("NOTICE nobody :hello?").await;
    alice.send("NOTICE #nowhere :hello?").await;
    assert!(alice.sync().await.is_empty());
}

#[tokio::test]
async fn test_comma_separated_targets() {
    let (_server, addr) = start_server(test_config()).await;
    let mut alice = TestClient::register(addr, "alice").await;
    let mut bob = TestClient::register(addr, "bob").await;
    let mut carol = TestClient::register(addr, "carol").await;

    alice.send("PRIVMSG bob,nobody,carol :hi all").await;
    assert_eq!(command_of(&alice.recv().await), "401");
    assert!(bob.recv().await.ends_with("PRIVMSG bob :hi all"));
    assert!(carol.recv().await.ends_with("PRIVMSG carol :hi all"));
}

#[tokio::test]
async fn test_ping_pong() {
    let (_server, addr) = start_server(test_config()).await;
    let mut client = TestClient::connect(addr).await;

    client.send("PING :token123").await;
    assert_eq!(client.recv().await, ":irc.test PONG irc.test token123");
}

#[tokio::test]
async fn test_channel_operator_commands() {
    let (_server, addr) = start_server(test_config()).await;
    let mut alice = TestClient::register(addr, "alice").await;
    let mut bob = TestClient::register(addr, "bob").await;
    let mut carol = TestClient::register(addr, "carol").await;

    alice.send("JOIN #ops").await;
    let names = alice.expect(|l| command_of(l) == "353").await;
    assert_eq!(names, ":irc.test 353 alice = #ops @alice");
    alice.expect(|l| command_of(l) == "366").await;

    alice.send("MODE #ops +k hunter2").await;
    assert!(alice.recv().await.ends_with("MODE #ops +k hunter2"));
    alice.send("MODE #ops").await;
    assert_eq!(alice.recv().await, ":irc.test 324 alice #ops +k hunter2");

    bob.send("JOIN #ops").await;
    assert_eq!(bob.recv().await, ":irc.test 475 bob #ops :Cannot join channel (+k)");
    bob.send("JOIN #ops hunter2").await;
    bob.expect(|l| command_of(l) == "366").await;
    alice.expect(|l| l.contains(" JOIN ")).await;

    alice.send("BAN #ops carol!*@*").await;
    assert!(alice.recv().await.ends_with("MODE #ops +b carol!*@*"));
    carol.send("JOIN #ops hunter2").await;
    assert_eq!(carol.recv().await, ":irc.test 474 carol #ops :Cannot join channel (+b)");

    bob.expect(|l| l.contains(" MODE ")).await;
    bob.send("KICK #ops alice").await;
    assert_eq!(bob.recv().await, ":irc.test 482 bob #ops :You're not channel operator");

    alice.send("KICK #ops bob :out").await;
    let kick = bob.recv().await;
    assert!(kick.starts_with(":alice!"));
    assert!(kick.ends_with("KICK #ops bob out"));
    assert_eq!(alice.recv().await, kick);

    alice.send("MODE alice").await;
    assert_eq!(alice.recv().await, ":irc.test 221 alice +");
}
