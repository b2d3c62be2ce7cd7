//! Two predicting clients against an in-process server.

use std::time::{Duration, Instant};

use gomoku_board::{Color, GameConfig};
use gomoku_client::{ClientSession, UiNotice};
use gomoku_config::{ClientSettings, ServerSettings};
use gomoku_game::Outcome;

const DEADLINE: Duration = Duration::from_secs(5);

fn start_server(runtime: &tokio::runtime::Runtime) -> u16 {
    let settings = ServerSettings {
        bind_address: "127.0.0.1".to_string(),
        port: 0,
        single_game: true,
        max_connections: 16,
        default_game: GameConfig::default(),
    };
    let (server, listener) = runtime.block_on(gomoku_server::bind(&settings)).unwrap();
    let port = listener.local_addr().unwrap().port();
    runtime.spawn(async move {
        server.run_with_listener(listener).await.unwrap();
    });
    port
}

fn client(port: u16, name: &str) -> ClientSession {
    let settings = ClientSettings {
        server_address: "127.0.0.1".to_string(),
        server_port: port,
        player_name: name.to_string(),
        ..ClientSettings::default()
    };
    ClientSession::connect(&settings).unwrap()
}

/// Ticks until `done` holds, collecting notices on the way.
fn pump_until(
    session: &mut ClientSession,
    mut done: impl FnMut(&ClientSession) -> bool,
) -> Vec<UiNotice> {
    let start = Instant::now();
    let mut notices = Vec::new();
    while !done(session) {
        assert!(start.elapsed() < DEADLINE, "condition not reached in time");
        notices.extend(session.tick_blocking(Duration::from_millis(50)).notices);
    }
    notices
}

/// Ticks until `notice` shows up.
fn wait_for_notice(session: &mut ClientSession, notice: &UiNotice) -> Vec<UiNotice> {
    let start = Instant::now();
    let mut seen = Vec::new();
    while !seen.contains(notice) {
        assert!(start.elapsed() < DEADLINE, "no {notice:?} in time");
        seen.extend(session.tick_blocking(Duration::from_millis(50)).notices);
    }
    seen
}

fn cell(session: &ClientSession, x: i32, y: i32) -> Color {
    session
        .predictor()
        .state()
        .map_or(Color::Empty, |s| s.grid().get_cell(x, y))
}

#[test]
fn test_predicted_game_to_victory() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let port = start_server(&runtime);

    let mut alice = client(port, "alice");
    pump_until(&mut alice, |s| s.predictor().local_color() == Color::Black);
    let mut bob = client(port, "bob");
    pump_until(&mut bob, |s| s.predictor().local_color() == Color::White);
    pump_until(&mut alice, |s| s.predictor().player_names() == ["alice", "bob"]);

    for i in 0..4 {
        alice.on_local_input(i, 0);
        assert_eq!(cell(&alice, i, 0), Color::Black);
        pump_until(&mut bob, |s| s.predictor().is_my_turn());
        assert_eq!(cell(&bob, i, 0), Color::Black);

        bob.on_local_input(i, 5);
        pump_until(&mut alice, |s| s.predictor().is_my_turn());
        assert_eq!(cell(&alice, i, 5), Color::White);
    }

    // The winning move ends the match locally before the server replies.
    alice.on_local_input(4, 0);
    assert_eq!(
        alice.predictor().state().unwrap().outcome(),
        Some(Outcome::Winner(Color::Black))
    );
    wait_for_notice(&mut alice, &UiNotice::Info("you win".into()));

    wait_for_notice(&mut bob, &UiNotice::Info("black wins".into()));
    assert_eq!(
        bob.predictor().state().unwrap().outcome(),
        Some(Outcome::Winner(Color::Black))
    );
    assert_eq!(cell(&bob, 4, 0), Color::Black);

    bob.on_local_input(10, 10);
    assert_eq!(cell(&bob, 10, 10), Color::Empty);
}

#[test]
fn test_out_of_turn_click_stays_local() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let port = start_server(&runtime);

    let mut alice = client(port, "alice");
    pump_until(&mut alice, |s| s.predictor().local_color() == Color::Black);
    let mut bob = client(port, "bob");
    pump_until(&mut bob, |s| s.predictor().local_color() == Color::White);

    bob.on_local_input(7, 7);
    let notices = bob.tick().notices;
    assert!(notices.contains(&UiNotice::Error("not your turn".into())));
    assert_eq!(cell(&bob, 7, 7), Color::Empty);
    assert!(alice.predictor().is_my_turn());
}

#[test]
fn test_unreachable_server_reports_failure() {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let mut session = client(port, "nobody");
    let notices = wait_for_notice(&mut session, &UiNotice::Disconnected);
    assert!(matches!(notices.first(), Some(UiNotice::Error(_))));
    assert!(session.predictor().state().is_none());
}
