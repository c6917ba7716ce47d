//! End-to-end scenarios: literal server lines in, outgoing lines and
//! events out.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use chrono::{TimeZone, Utc};

use slirc_engine::{Client, ErrorKind, Identity, MessageTarget, Plain, Sink, WhoisResponse};

/// A sink the test can read while the client owns its handle.
#[derive(Clone, Default)]
struct SharedSink(Rc<RefCell<Vec<u8>>>);

impl Sink for SharedSink {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.0.borrow_mut().extend_from_slice(bytes);
        Ok(())
    }
}

impl SharedSink {
    fn lines(&self) -> Vec<String> {
        String::from_utf8(self.0.borrow().clone())
            .expect("engine writes UTF-8")
            .split("\r\n")
            .filter(|l| !l.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

fn client_named(nick: &str) -> (SharedSink, Client) {
    let sink = SharedSink::default();
    let client = Client::new(sink.clone(), Identity::new(nick, nick, nick))
        .expect("writes to a Vec cannot fail");
    (sink, client)
}

#[test]
fn registration_and_welcome() {
    let (sink, mut client) = client_named("someone");

    let connects = Rc::new(RefCell::new(0));
    let counter = connects.clone();
    client.on_connect(move |_| *counter.borrow_mut() += 1);

    client.push(":localhost CAP * LS :multi-prefix sasl").unwrap();
    client.push(":localhost CAP * ACK :multi-prefix").unwrap();
    client.push(":localhost 001 someone :Welcome").unwrap();

    assert_eq!(
        sink.lines(),
        vec![
            "CAP LS 302",
            "NICK someone",
            "USER someone 0 * :someone",
            "CAP REQ :multi-prefix sasl",
            "CAP END",
        ]
    );
    assert_eq!(*connects.borrow(), 1);
    assert!(client.is_registered());
    assert!(client.cap_enabled("multi-prefix"));

    // 001 must not fire onConnect twice
    client.push(":localhost 001 someone :Welcome").unwrap();
    assert_eq!(*connects.borrow(), 1);
}

#[test]
fn nested_batch_is_held_until_outer_close() {
    let (_sink, mut client) = client_named("someone");

    let messages = Rc::new(RefCell::new(Vec::new()));
    let seen = messages.clone();
    client.on_message(move |event| {
        seen.borrow_mut().push((
            event.text.clone(),
            event.meta.batch.as_ref().map(|b| b.reference.clone()),
        ));
    });

    client.push(":irc.host BATCH +outer example.com/foo").unwrap();
    client
        .push("@batch=outer :irc.host BATCH +inner example.com/bar")
        .unwrap();
    client.push("@batch=inner :nick!u@h PRIVMSG #c :Hi").unwrap();
    client.push("@batch=outer :irc.host BATCH -inner").unwrap();
    assert!(messages.borrow().is_empty(), "no events before the root closes");

    client.push(":irc.host BATCH -outer").unwrap();
    let seen = messages.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, "Hi");
    assert_eq!(seen[0].1.as_deref(), Some("inner"));
}

#[test]
fn batched_events_follow_arrival_order() {
    // Direct lines and sibling sub-batches must dispatch exactly as the
    // server interleaved them, not grouped by kind.
    let (_sink, mut client) = client_named("someone");

    let texts = Rc::new(RefCell::new(Vec::new()));
    let seen = texts.clone();
    client.on_message(move |event| seen.borrow_mut().push(event.text.clone()));

    client.push(":irc.host BATCH +root example.com/root").unwrap();
    client.push("@batch=root :n!u@h PRIVMSG #c :one").unwrap();
    client.push("@batch=root :irc.host BATCH +a example.com/a").unwrap();
    client.push("@batch=a :n!u@h PRIVMSG #c :in-a").unwrap();
    client.push("@batch=root :irc.host BATCH -a").unwrap();
    client.push("@batch=root :n!u@h PRIVMSG #c :two").unwrap();
    client.push("@batch=root :irc.host BATCH +b example.com/b").unwrap();
    client.push("@batch=b :n!u@h PRIVMSG #c :in-b").unwrap();
    client.push("@batch=root :irc.host BATCH -b").unwrap();
    assert!(texts.borrow().is_empty());

    client.push(":irc.host BATCH -root").unwrap();
    assert_eq!(*texts.borrow(), vec!["one", "in-a", "two", "in-b"]);
}

#[test]
fn welcome_before_caps_settle_defers_connect() {
    // 001 arriving while a CAP REQ is unanswered must not complete
    // registration; onConnect fires when the last condition settles.
    let (sink, mut client) = client_named("someone");

    let connects = Rc::new(RefCell::new(0));
    let counter = connects.clone();
    client.on_connect(move |_| *counter.borrow_mut() += 1);

    client.push(":localhost CAP * LS :multi-prefix").unwrap();
    client.push(":localhost 001 someone :Welcome").unwrap();
    assert_eq!(*connects.borrow(), 0);
    assert!(!client.is_registered());

    client.push(":localhost CAP * ACK :multi-prefix").unwrap();
    assert_eq!(*connects.borrow(), 1);
    assert!(client.is_registered());
    assert!(sink.lines().contains(&"CAP END".to_owned()));
}

#[test]
fn welcome_during_multiline_ls_defers_connect() {
    let (sink, mut client) = client_named("someone");

    let connects = Rc::new(RefCell::new(0));
    let counter = connects.clone();
    client.on_connect(move |_| *counter.borrow_mut() += 1);

    client.push(":localhost CAP * LS * :multi-prefix").unwrap();
    client.push(":localhost 001 someone :Welcome").unwrap();
    assert_eq!(*connects.borrow(), 0, "listing still mid-continuation");
    assert!(
        !sink.lines().contains(&"CAP END".to_owned()),
        "END must wait for the final LS part"
    );

    client.push(":localhost CAP * LS :server-time").unwrap();
    client.push(":localhost CAP * ACK :multi-prefix server-time").unwrap();
    assert_eq!(*connects.borrow(), 1);
    assert!(client.is_registered());
}

#[test]
fn welcome_during_sasl_defers_connect() {
    let sink = SharedSink::default();
    let mut client = Client::with_sasl(
        sink.clone(),
        Identity::new("someone", "someone", "someone"),
        vec![Box::new(Plain::new("someone", "sesame"))],
    )
    .unwrap();

    let connects = Rc::new(RefCell::new(0));
    let counter = connects.clone();
    client.on_connect(move |_| *counter.borrow_mut() += 1);

    client.push(":localhost CAP * LS :sasl").unwrap();
    client.push(":localhost CAP * ACK :sasl").unwrap();
    client.push(":localhost 001 someone :Welcome").unwrap();
    assert_eq!(*connects.borrow(), 0, "SASL still in flight");
    assert!(!client.is_registered());

    client.push("AUTHENTICATE +").unwrap();
    client.push(":localhost 903 someone :SASL authentication successful").unwrap();
    assert_eq!(*connects.borrow(), 1);
    assert!(client.is_registered());
    assert!(sink.lines().contains(&"CAP END".to_owned()));
}

#[test]
fn mode_parsing_follows_isupport_categories() {
    let (_sink, mut client) = client_named("someone");
    client
        .push(":localhost 005 someone CHANMODES=b,k,l,imnpst :are supported by this server")
        .unwrap();

    let changes = Rc::new(RefCell::new(Vec::new()));
    let seen = changes.clone();
    client.on_mode(move |event| {
        let mode = event.change.mode();
        seen.borrow_mut().push((
            event.change.is_set(),
            mode.letter,
            mode.arg.clone(),
        ));
    });

    client
        .push(":op!u@h MODE #test -sk+nl secret 4")
        .unwrap();

    assert_eq!(
        *changes.borrow(),
        vec![
            (false, 's', None),
            (false, 'k', Some("secret".to_owned())),
            (true, 'n', None),
            (true, 'l', Some("4".to_owned())),
        ]
    );
}

#[test]
fn mode_argument_underrun_fires_nothing() {
    let (_sink, mut client) = client_named("someone");
    client
        .push(":localhost 005 someone CHANMODES=b,k,l,imnpst :are supported by this server")
        .unwrap();

    let fired = Rc::new(RefCell::new(0));
    let counter = fired.clone();
    client.on_mode(move |_| *counter.borrow_mut() += 1);

    client.push(":op!u@h MODE #test +nk").unwrap();
    assert_eq!(*fired.borrow(), 0);
}

#[test]
fn whois_aggregation_gates_on_318() {
    let (_sink, mut client) = client_named("someone");

    let replies: Rc<RefCell<Vec<WhoisResponse>>> = Rc::new(RefCell::new(Vec::new()));
    let seen = replies.clone();
    client.on_whois(move |response| seen.borrow_mut().push(response.clone()));

    client
        .push(":localhost 311 someone someoneElse someUsername someHostname * :Some Real Name")
        .unwrap();
    client.push(":localhost 312 someone someoneElse example.net :An example server").unwrap();
    client.push(":localhost 313 someone someoneElse :is an IRC operator").unwrap();
    client.push(":localhost 317 someone someoneElse 1000 1500000000 :seconds idle, signon time").unwrap();
    client.push(":localhost 671 someone someoneElse :is using a secure connection").unwrap();
    client.push(":localhost 307 someone someoneElse :is a registered nick").unwrap();
    client.push(":localhost 330 someone someoneElse someoneElseAccount :is logged in as").unwrap();
    client.push(":localhost 319 someone someoneElse :+#test #test2").unwrap();
    assert!(replies.borrow().is_empty(), "nothing fires before 318");

    client.push(":localhost 318 someone someoneElse :End of /WHOIS list").unwrap();

    let replies = replies.borrow();
    assert_eq!(replies.len(), 1);
    let whois = &replies[0];
    assert_eq!(whois.nickname, "someoneElse");
    assert_eq!(whois.username.as_deref(), Some("someUsername"));
    assert_eq!(whois.hostname.as_deref(), Some("someHostname"));
    assert_eq!(whois.realname.as_deref(), Some("Some Real Name"));
    assert!(whois.is_oper);
    assert!(whois.is_secure);
    assert!(whois.is_registered);
    assert_eq!(whois.account.as_deref(), Some("someoneElseAccount"));
    assert_eq!(whois.connected_to.as_deref(), Some("example.net"));
    assert_eq!(whois.idle, Some(std::time::Duration::from_secs(1000)));
    assert_eq!(
        whois.connected_time,
        Some(Utc.with_ymd_and_hms(2017, 7, 14, 2, 40, 0).unwrap())
    );
    assert_eq!(whois.channels.get("#test").map(String::as_str), Some("+"));
    assert_eq!(whois.channels.get("#test2").map(String::as_str), Some(""));
}

#[test]
fn end_of_whois_without_data_is_unexpected() {
    let (_sink, mut client) = client_named("someone");

    let errors = Rc::new(RefCell::new(Vec::new()));
    let seen = errors.clone();
    client.on_error(move |event| seen.borrow_mut().push(event.kind));

    client.push(":localhost 318 someone ghost :End of /WHOIS list").unwrap();
    assert_eq!(*errors.borrow(), vec![ErrorKind::Unexpected]);
}

#[test]
fn metadata_subscription_flow() {
    let (sink, mut client) = client_named("someone");

    client
        .push(":localhost CAP * LS :draft/metadata-2=maxsub=50,maxkey=25")
        .unwrap();
    client.push(":localhost CAP * ACK :draft/metadata-2").unwrap();

    assert_eq!(client.metadata().max_subscriptions(), Some(50));
    assert_eq!(client.metadata().max_keys(), Some(25));

    client
        .metadata_sub(&["avatar", "website", "foo", "bar", "baz"])
        .unwrap();
    assert!(sink
        .lines()
        .contains(&"METADATA * SUB avatar website foo bar baz".to_owned()));

    client
        .push(":localhost 770 someone :avatar website foo bar baz")
        .unwrap();
    let subscribed: Vec<&str> = client.metadata().subscriptions().collect();
    assert_eq!(subscribed, vec!["avatar", "bar", "baz", "foo", "website"]);

    client.metadata_unsub(&["foo", "bar"]).unwrap();
    client.push(":localhost 771 someone :bar foo").unwrap();
    let subscribed: Vec<&str> = client.metadata().subscriptions().collect();
    assert_eq!(subscribed, vec!["avatar", "baz", "website"]);
}

#[test]
fn sasl_plain_authenticates() {
    let sink = SharedSink::default();
    let mut client = Client::with_sasl(
        sink.clone(),
        Identity::new("someone", "someone", "someone"),
        vec![Box::new(Plain::with_authzid("jilles", "jilles", "sesame"))],
    )
    .unwrap();

    client.push(":localhost CAP * LS :sasl=EXTERNAL,PLAIN").unwrap();
    client.push(":localhost CAP * ACK :sasl").unwrap();
    assert!(sink.lines().contains(&"AUTHENTICATE PLAIN".to_owned()));
    assert!(
        !sink.lines().contains(&"CAP END".to_owned()),
        "registration held while SASL is in flight"
    );

    client.push("AUTHENTICATE +").unwrap();
    assert!(sink
        .lines()
        .contains(&"AUTHENTICATE amlsbGVzAGppbGxlcwBzZXNhbWU=".to_owned()));

    client.push(":localhost 903 someone :SASL authentication successful").unwrap();
    assert!(client.is_authenticated());
    assert!(sink.lines().contains(&"CAP END".to_owned()));
}

#[test]
fn sasl_failure_still_releases_registration() {
    let sink = SharedSink::default();
    let mut client = Client::with_sasl(
        sink.clone(),
        Identity::new("someone", "someone", "someone"),
        vec![Box::new(Plain::new("someone", "wrong"))],
    )
    .unwrap();

    client.push(":localhost CAP * LS :sasl").unwrap();
    client.push(":localhost CAP * ACK :sasl").unwrap();
    client.push(":localhost 904 someone :SASL authentication failed").unwrap();

    assert!(!client.is_authenticated());
    assert!(sink.lines().contains(&"CAP END".to_owned()));
}

#[test]
fn nick_rename_rekeys_roster_and_channels() {
    let (_sink, mut client) = client_named("someone");
    client.push(":localhost 001 someone :Welcome").unwrap();

    client.push(":someone!me@local JOIN #test").unwrap();
    client.push(":localhost 353 someone = #test :someone A").unwrap();
    client.push(":A!a@host JOIN #test").unwrap();

    client.push(":A NICK B").unwrap();

    assert!(client.user("A").is_none());
    let renamed = client.user("B").expect("renamed user kept");
    assert_eq!(renamed.host.as_deref(), Some("host"));

    let channel = client.channel("#test").unwrap();
    assert!(channel.member("b").is_some());
    assert!(channel.member("a").is_none());
}

#[test]
fn self_membership_lifecycle() {
    let (_sink, mut client) = client_named("someone");
    client.push(":localhost 001 someone :Welcome").unwrap();

    client.push(":someone!me@local JOIN #test").unwrap();
    assert!(client.channel("#test").unwrap().member("someone").is_some());

    client.push(":someone!me@local PART #test").unwrap();
    assert!(client.channel("#test").is_none());

    client.push(":someone!me@local JOIN #kicky").unwrap();
    client.push(":op!o@h KICK #kicky someone :bye").unwrap();
    assert!(client.channel("#kicky").is_none());
}

#[test]
fn own_quit_invalidates_the_session() {
    let (_sink, mut client) = client_named("someone");
    client.push(":localhost 001 someone :Welcome").unwrap();

    client.push(":someone!me@local QUIT :Leaving").unwrap();
    assert!(client.is_invalidated());
    assert!(client.push("PING :x").is_err());
}

#[test]
fn message_classification_and_echo() {
    let (_sink, mut client) = client_named("someone");
    client
        .push(":localhost 005 someone CHANTYPES=# STATUSMSG=@+ :are supported by this server")
        .unwrap();

    let events = Rc::new(RefCell::new(Vec::new()));
    let seen = events.clone();
    client.on_message(move |event| {
        seen.borrow_mut()
            .push((event.target.clone(), event.notice, event.echo));
    });

    client.push(":other!u@h PRIVMSG #chan :hello").unwrap();
    client.push(":other!u@h PRIVMSG @#chan :ops only").unwrap();
    client.push(":other!u@h NOTICE someone :direct").unwrap();
    client.push(":someone!me@local PRIVMSG #chan :echoed").unwrap();

    let seen = events.borrow();
    assert_eq!(
        seen[0].0,
        MessageTarget::Channel {
            name: "#chan".into(),
            statusmsg: None
        }
    );
    assert_eq!(
        seen[1].0,
        MessageTarget::Channel {
            name: "#chan".into(),
            statusmsg: Some('@')
        }
    );
    assert_eq!(seen[2].0, MessageTarget::User("someone".into()));
    assert!(seen[2].1, "NOTICE flag set");
    assert!(seen[3].2, "own message flagged as echo");
}

#[test]
fn ping_answers_with_same_payload() {
    let (sink, mut client) = client_named("someone");
    client.push("PING :irc.example.com").unwrap();
    assert!(sink.lines().contains(&"PONG :irc.example.com".to_owned()));
}

#[test]
fn unknown_verbs_are_reported_not_fatal() {
    let (_sink, mut client) = client_named("someone");

    let errors = Rc::new(RefCell::new(Vec::new()));
    let seen = errors.clone();
    client.on_error(move |event| seen.borrow_mut().push(event.kind));

    client.push(":server WIBBLE a b c").unwrap();
    client.push("@malformed").unwrap();
    client.push(":server 999 someone :strange").unwrap();

    assert_eq!(
        *errors.borrow(),
        vec![
            ErrorKind::Unrecognized,
            ErrorKind::Malformed,
            ErrorKind::Unrecognized
        ]
    );
}

#[test]
fn kicklen_is_enforced_at_format_time() {
    let (sink, mut client) = client_named("someone");
    client
        .push(":localhost 005 someone KICKLEN=10 :are supported by this server")
        .unwrap();

    assert!(client
        .send_kick("#chan", "bad", Some("this reason is far too long"))
        .is_err());
    assert!(client.send_kick("#chan", "bad", Some("short")).is_ok());
    assert!(sink.lines().contains(&"KICK #chan bad :short".to_owned()));
}

#[test]
fn oper_operands_must_not_contain_spaces() {
    let (_sink, mut client) = client_named("someone");
    assert!(client.send_oper("name with space", "pw").is_err());
    assert!(client.send_squit("bad server", "comment").is_err());
    assert!(client.send_oper("name", "pw").is_ok());
}

#[test]
fn extended_join_populates_account_and_realname() {
    let (_sink, mut client) = client_named("someone");
    client.push(":localhost 001 someone :Welcome").unwrap();
    client.push(":someone!me@local JOIN #test").unwrap();

    client
        .push(":other!u@h JOIN #test otheracct :Other Person")
        .unwrap();
    let user = client.user("other").unwrap();
    assert_eq!(user.account.as_deref(), Some("otheracct"));
    assert_eq!(user.realname.as_deref(), Some("Other Person"));

    // `*` means no account
    client.push(":anon!u@h JOIN #test * :Anon").unwrap();
    assert!(client.user("anon").unwrap().account.is_none());
}

#[test]
fn chghost_updates_the_mask() {
    let (_sink, mut client) = client_named("someone");
    client.push(":localhost 001 someone :Welcome").unwrap();
    client.push(":other!old@old.host JOIN #test").unwrap();

    let changes = Rc::new(RefCell::new(Vec::new()));
    let seen = changes.clone();
    client.on_chghost(move |event| {
        seen.borrow_mut()
            .push((event.old_mask.clone(), event.user.mask()));
    });

    client.push(":other!old@old.host CHGHOST new new.host").unwrap();
    assert_eq!(
        *changes.borrow(),
        vec![("other!old@old.host".to_owned(), "other!new@new.host".to_owned())]
    );
}

#[test]
fn cap_new_triggers_request_and_del_disables() {
    let (sink, mut client) = client_named("someone");
    client.push(":localhost CAP * LS :multi-prefix").unwrap();
    client.push(":localhost CAP * ACK :multi-prefix").unwrap();
    client.push(":localhost 001 someone :Welcome").unwrap();

    client.push(":localhost CAP someone NEW :away-notify").unwrap();
    assert!(sink.lines().contains(&"CAP REQ :away-notify".to_owned()));
    client.push(":localhost CAP someone ACK :away-notify").unwrap();
    assert!(client.cap_enabled("away-notify"));

    client.push(":localhost CAP someone DEL :away-notify").unwrap();
    assert!(!client.cap_enabled("away-notify"));
}
