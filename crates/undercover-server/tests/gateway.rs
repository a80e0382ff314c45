//! End-to-end gateway tests.
//!
//! Connections are stood in for by unbounded channels — the same
//! channel type the real server registers — so these tests exercise
//! dispatch, guard enforcement, and fanout without sockets, and stay
//! fully deterministic apart from which player draws which role.

use tokio::sync::mpsc::{self, UnboundedReceiver};
use undercover_protocol::{
    AdminCommand, ClientMessage, ConnectionId, GameSettings, Role,
    RoomSnapshot, RoomStatus, ServerEvent, Winners,
};
use undercover_server::Gateway;

struct Client {
    id: ConnectionId,
    rx: UnboundedReceiver<ServerEvent>,
}

impl Client {
    fn recv(&mut self) -> ServerEvent {
        self.rx
            .try_recv()
            .unwrap_or_else(|_| panic!("{} expected an event", self.id))
    }

    fn drain(&mut self) {
        while self.rx.try_recv().is_ok() {}
    }

    fn assert_silent(&mut self) {
        if let Ok(ev) = self.rx.try_recv() {
            panic!("{} unexpectedly received {ev:?}", self.id);
        }
    }
}

fn connect(gateway: &mut Gateway, id: u64) -> Client {
    let (tx, rx) = mpsc::unbounded_channel();
    let conn = ConnectionId(id);
    gateway.register(conn, tx);
    Client { id: conn, rx }
}

fn create_room(gateway: &mut Gateway, client: &mut Client, name: &str) -> String {
    gateway.dispatch(
        client.id,
        ClientMessage::CreateRoom {
            username: name.into(),
        },
    );
    match client.recv() {
        ServerEvent::RoomCreated { room } => room.code.as_str().to_string(),
        other => panic!("expected RoomCreated, got {other:?}"),
    }
}

/// Creates a room with `n` members (ids 1..=n, names p1..pn) and
/// drains every join notification.
fn setup_room(gateway: &mut Gateway, n: u64) -> (String, Vec<Client>) {
    let mut clients = Vec::new();
    let mut creator = connect(gateway, 1);
    let code = create_room(gateway, &mut creator, "p1");
    clients.push(creator);

    for i in 2..=n {
        let mut client = connect(gateway, i);
        gateway.dispatch(
            client.id,
            ClientMessage::JoinRoom {
                room_code: code.clone(),
                username: format!("p{i}"),
            },
        );
        assert!(matches!(client.recv(), ServerEvent::JoinSuccess { .. }));
        clients.push(client);
    }
    for client in &mut clients {
        client.drain();
    }
    (code, clients)
}

fn own_role(snapshot: &RoomSnapshot, id: ConnectionId) -> Option<Role> {
    snapshot
        .players
        .iter()
        .find(|p| p.id == id)
        .and_then(|p| p.role)
}

/// Starts the game and returns each client's own snapshot.
fn start_game(
    gateway: &mut Gateway,
    code: &str,
    clients: &mut [Client],
) -> Vec<RoomSnapshot> {
    gateway.dispatch(
        clients[0].id,
        ClientMessage::StartGame {
            room_code: code.to_string(),
        },
    );
    clients
        .iter_mut()
        .map(|c| match c.recv() {
            ServerEvent::GameStarted { room } => room,
            other => panic!("expected GameStarted, got {other:?}"),
        })
        .collect()
}

// -- lobby --------------------------------------------------------------

#[test]
fn test_create_room_returns_lobby_snapshot() {
    let mut gateway = Gateway::new();
    let mut client = connect(&mut gateway, 1);

    gateway.dispatch(
        client.id,
        ClientMessage::CreateRoom {
            username: "  ana  ".into(),
        },
    );
    match client.recv() {
        ServerEvent::RoomCreated { room } => {
            assert_eq!(room.status, RoomStatus::Lobby);
            assert_eq!(room.creator, client.id);
            assert_eq!(room.players.len(), 1);
            assert_eq!(room.players[0].username, "ana");
            assert_eq!(room.code.as_str().len(), 4);
        }
        other => panic!("expected RoomCreated, got {other:?}"),
    }
}

#[test]
fn test_blank_username_is_a_validation_error() {
    let mut gateway = Gateway::new();
    let mut client = connect(&mut gateway, 1);

    gateway.dispatch(
        client.id,
        ClientMessage::CreateRoom {
            username: "   ".into(),
        },
    );
    assert!(matches!(
        client.recv(),
        ServerEvent::Error { code: 400, .. }
    ));
}

#[test]
fn test_join_unknown_room_errors_sender_only() {
    let mut gateway = Gateway::new();
    let mut bystander = connect(&mut gateway, 1);
    let code = create_room(&mut gateway, &mut bystander, "ana");
    let mut joiner = connect(&mut gateway, 2);

    gateway.dispatch(
        joiner.id,
        ClientMessage::JoinRoom {
            room_code: "QQQQ".into(),
            username: "bob".into(),
        },
    );
    assert!(matches!(
        joiner.recv(),
        ServerEvent::Error { code: 404, .. }
    ));
    bystander.assert_silent();

    // The real room is untouched.
    gateway.dispatch(
        joiner.id,
        ClientMessage::JoinRoom {
            room_code: code,
            username: "bob".into(),
        },
    );
    assert!(matches!(joiner.recv(), ServerEvent::JoinSuccess { .. }));
}

#[test]
fn test_room_codes_are_case_insensitive() {
    let mut gateway = Gateway::new();
    let mut creator = connect(&mut gateway, 1);
    let code = create_room(&mut gateway, &mut creator, "ana");

    let mut joiner = connect(&mut gateway, 2);
    gateway.dispatch(
        joiner.id,
        ClientMessage::JoinRoom {
            room_code: format!("  {}  ", code.to_lowercase()),
            username: "bob".into(),
        },
    );
    assert!(matches!(joiner.recv(), ServerEvent::JoinSuccess { .. }));
}

#[test]
fn test_join_broadcasts_updated_roster_to_everyone() {
    let mut gateway = Gateway::new();
    let mut creator = connect(&mut gateway, 1);
    let code = create_room(&mut gateway, &mut creator, "ana");

    let mut joiner = connect(&mut gateway, 2);
    gateway.dispatch(
        joiner.id,
        ClientMessage::JoinRoom {
            room_code: code,
            username: "bob".into(),
        },
    );

    assert!(matches!(joiner.recv(), ServerEvent::JoinSuccess { .. }));
    assert!(matches!(joiner.recv(), ServerEvent::RoomUpdated { .. }));
    match creator.recv() {
        ServerEvent::RoomUpdated { room } => {
            assert_eq!(room.players.len(), 2)
        }
        other => panic!("expected RoomUpdated, got {other:?}"),
    }
}

#[test]
fn test_creating_a_second_room_leaves_the_first() {
    let mut gateway = Gateway::new();
    let (_code, mut clients) = setup_room(&mut gateway, 2);

    // p2 opens their own room on the same connection; they must not
    // linger as a member of the old one.
    gateway.dispatch(
        clients[1].id,
        ClientMessage::CreateRoom {
            username: "p2".into(),
        },
    );
    match clients[1].recv() {
        ServerEvent::RoomCreated { room } => {
            assert_eq!(room.players.len(), 1)
        }
        other => panic!("expected RoomCreated, got {other:?}"),
    }
    match clients[0].recv() {
        ServerEvent::RoomUpdated { room } => {
            assert_eq!(room.players.len(), 1);
            assert!(room.players.iter().all(|p| p.id != clients[1].id));
        }
        other => panic!("expected RoomUpdated, got {other:?}"),
    }
    assert_eq!(gateway.registry().room_count(), 2);
}

#[test]
fn test_switching_rooms_leaves_no_ghost_member() {
    let mut gateway = Gateway::new();
    let mut ana = connect(&mut gateway, 1);
    let _first = create_room(&mut gateway, &mut ana, "ana");

    let mut bob = connect(&mut gateway, 2);
    let second = create_room(&mut gateway, &mut bob, "bob");

    // ana abandons her solo room for bob's; hers must be deleted.
    gateway.dispatch(
        ana.id,
        ClientMessage::JoinRoom {
            room_code: second,
            username: "ana".into(),
        },
    );
    assert!(matches!(ana.recv(), ServerEvent::JoinSuccess { .. }));
    assert_eq!(gateway.registry().room_count(), 1);
}

// -- starting -----------------------------------------------------------

#[test]
fn test_start_is_creator_only_and_error_stays_private() {
    let mut gateway = Gateway::new();
    let (code, mut clients) = setup_room(&mut gateway, 3);

    gateway.dispatch(
        clients[1].id,
        ClientMessage::StartGame { room_code: code },
    );
    assert!(matches!(
        clients[1].recv(),
        ServerEvent::Error { code: 409, .. }
    ));
    clients[0].assert_silent();
    clients[2].assert_silent();
}

#[test]
fn test_start_deals_secret_roles() {
    let mut gateway = Gateway::new();
    let (code, mut clients) = setup_room(&mut gateway, 5);
    let snapshots = start_game(&mut gateway, &code, &mut clients);

    // Everyone agrees on the public state.
    let turn_owner = snapshots[0].turn_owner.expect("turn owner set");
    for snap in &snapshots {
        assert_eq!(snap.status, RoomStatus::Playing);
        assert_eq!(snap.turn_owner, Some(turn_owner));
    }

    // Each client sees exactly one role: their own.
    let mut roles = Vec::new();
    for (client, snap) in clients.iter().zip(&snapshots) {
        let mine = own_role(snap, client.id).expect("own role visible");
        roles.push(mine);
        let visible = snap.players.iter().filter(|p| p.role.is_some()).count();
        assert_eq!(visible, 1, "only the viewer's role may be visible");
    }

    // Default settings over 5 players: 1 spy, 1 Mr. White, 3 civilians.
    let count = |r: Role| roles.iter().filter(|&&x| x == r).count();
    assert_eq!(count(Role::Spy), 1);
    assert_eq!(count(Role::MrWhite), 1);
    assert_eq!(count(Role::Civilian), 3);
}

// -- full round ---------------------------------------------------------

#[test]
fn test_full_round_through_voting_and_results() {
    let mut gateway = Gateway::new();
    let (code, mut clients) = setup_room(&mut gateway, 5);
    let snapshots = start_game(&mut gateway, &code, &mut clients);

    let spy = clients
        .iter()
        .zip(&snapshots)
        .find(|(c, s)| own_role(s, c.id) == Some(Role::Spy))
        .map(|(c, _)| c.id)
        .expect("one spy dealt");

    // The turn owner describes; everyone hears it.
    let owner = snapshots[0].turn_owner.unwrap();
    gateway.dispatch(
        owner,
        ClientMessage::SubmitDescription {
            room_code: code.clone(),
            text: "you can drink it".into(),
        },
    );
    for client in &mut clients {
        assert!(matches!(
            client.recv(),
            ServerEvent::DescriptionUpdate { descriptions, last_speaker }
                if descriptions.len() == 1 && last_speaker == owner
        ));
        assert!(matches!(
            client.recv(),
            ServerEvent::AwaitingNextPlayer { speaker } if speaker == owner
        ));
    }

    // Hand the turn on.
    let next = clients.iter().find(|c| c.id != owner).unwrap().id;
    gateway.dispatch(
        owner,
        ClientMessage::ChooseNextPlayer {
            room_code: code.clone(),
            target: next,
        },
    );
    for client in &mut clients {
        assert!(matches!(
            client.recv(),
            ServerEvent::TurnUpdated { turn_owner } if turn_owner == next
        ));
    }

    // Open voting.
    gateway.dispatch(
        clients[0].id,
        ClientMessage::StartVoting {
            room_code: code.clone(),
        },
    );
    for client in &mut clients {
        assert!(matches!(client.recv(), ServerEvent::VotingStarted { .. }));
    }

    // Everyone votes for the spy; the last ballot resolves the round.
    let voters: Vec<ConnectionId> = clients.iter().map(|c| c.id).collect();
    for (i, &voter) in voters.iter().enumerate() {
        gateway.dispatch(
            voter,
            ClientMessage::CastVote {
                room_code: code.clone(),
                target: spy,
            },
        );
        let resolving = i == voters.len() - 1;
        for client in &mut clients {
            if resolving {
                match client.recv() {
                    ServerEvent::GameEnded { room } => {
                        assert_eq!(room.status, RoomStatus::Results);
                        assert_eq!(room.winners, Some(Winners::Civilians));
                        assert_eq!(room.eliminated, vec![spy]);
                        // Results reveal every role.
                        assert!(room.players.iter().all(|p| p.role.is_some()));
                    }
                    other => panic!("expected GameEnded, got {other:?}"),
                }
            } else {
                assert!(matches!(client.recv(), ServerEvent::VoteUpdate { .. }));
            }
        }
    }

    // A straggler vote after resolution is a silent no-op.
    gateway.dispatch(
        voters[0],
        ClientMessage::CastVote {
            room_code: code.clone(),
            target: spy,
        },
    );
    for client in &mut clients {
        client.assert_silent();
    }

    // Play again returns the lobby with membership intact.
    gateway.dispatch(
        clients[2].id,
        ClientMessage::PlayAgain {
            room_code: code.clone(),
        },
    );
    for client in &mut clients {
        match client.recv() {
            ServerEvent::RoomUpdated { room } => {
                assert_eq!(room.status, RoomStatus::Lobby);
                assert_eq!(room.players.len(), 5);
                assert!(room.players.iter().all(|p| p.role.is_none()));
                assert!(room.eliminated.is_empty());
            }
            other => panic!("expected RoomUpdated, got {other:?}"),
        }
    }
}

#[test]
fn test_description_from_non_turn_owner_is_rejected() {
    let mut gateway = Gateway::new();
    let (code, mut clients) = setup_room(&mut gateway, 3);
    let snapshots = start_game(&mut gateway, &code, &mut clients);

    let owner = snapshots[0].turn_owner.unwrap();
    let intruder = clients.iter().find(|c| c.id != owner).unwrap().id;

    gateway.dispatch(
        intruder,
        ClientMessage::SubmitDescription {
            room_code: code,
            text: "not my turn".into(),
        },
    );
    for client in &mut clients {
        if client.id == intruder {
            assert!(matches!(
                client.recv(),
                ServerEvent::Error { code: 409, .. }
            ));
        } else {
            client.assert_silent();
        }
    }
}

#[test]
fn test_duplicate_vote_is_rejected_privately() {
    let mut gateway = Gateway::new();
    let (code, mut clients) = setup_room(&mut gateway, 3);
    start_game(&mut gateway, &code, &mut clients);

    gateway.dispatch(
        clients[0].id,
        ClientMessage::StartVoting {
            room_code: code.clone(),
        },
    );
    for client in &mut clients {
        client.drain();
    }

    let target = clients[1].id;
    gateway.dispatch(
        clients[0].id,
        ClientMessage::CastVote {
            room_code: code.clone(),
            target,
        },
    );
    for client in &mut clients {
        client.drain();
    }

    gateway.dispatch(
        clients[0].id,
        ClientMessage::CastVote {
            room_code: code,
            target,
        },
    );
    assert!(matches!(
        clients[0].recv(),
        ServerEvent::Error { code: 409, .. }
    ));
    clients[1].assert_silent();
    clients[2].assert_silent();
}

// -- spy chat -----------------------------------------------------------

#[test]
fn test_spy_chat_goes_to_spies_only() {
    let mut gateway = Gateway::new();
    let (code, mut clients) = setup_room(&mut gateway, 5);
    let snapshots = start_game(&mut gateway, &code, &mut clients);

    let spy = clients
        .iter()
        .zip(&snapshots)
        .find(|(c, s)| own_role(s, c.id) == Some(Role::Spy))
        .map(|(c, _)| c.id)
        .unwrap();
    let civilian = clients
        .iter()
        .zip(&snapshots)
        .find(|(c, s)| own_role(s, c.id) == Some(Role::Civilian))
        .map(|(c, _)| c.id)
        .unwrap();

    gateway.dispatch(
        spy,
        ClientMessage::SpyChat {
            room_code: code.clone(),
            message: "stay quiet".into(),
        },
    );
    for client in &mut clients {
        if client.id == spy {
            assert!(matches!(
                client.recv(),
                ServerEvent::SpyChatMessage { message, .. }
                    if message == "stay quiet"
            ));
        } else {
            client.assert_silent();
        }
    }

    // A civilian cannot use the channel.
    gateway.dispatch(
        civilian,
        ClientMessage::SpyChat {
            room_code: code,
            message: "hello spies?".into(),
        },
    );
    for client in &mut clients {
        if client.id == civilian {
            assert!(matches!(
                client.recv(),
                ServerEvent::Error { code: 409, .. }
            ));
        } else {
            client.assert_silent();
        }
    }
}

// -- administration -----------------------------------------------------

#[test]
fn test_settings_update_is_creator_only() {
    let mut gateway = Gateway::new();
    let (code, mut clients) = setup_room(&mut gateway, 3);
    let settings = GameSettings {
        num_spies: 2,
        num_mr_white: 1,
    };

    gateway.dispatch(
        clients[1].id,
        ClientMessage::UpdateSettings {
            room_code: code.clone(),
            settings,
        },
    );
    assert!(matches!(
        clients[1].recv(),
        ServerEvent::Error { code: 409, .. }
    ));

    gateway.dispatch(
        clients[0].id,
        ClientMessage::UpdateSettings {
            room_code: code,
            settings,
        },
    );
    for client in &mut clients {
        match client.recv() {
            ServerEvent::RoomUpdated { room } => {
                assert_eq!(room.settings, settings)
            }
            other => panic!("expected RoomUpdated, got {other:?}"),
        }
    }
}

#[test]
fn test_kick_removes_member_and_stops_their_updates() {
    let mut gateway = Gateway::new();
    let (code, mut clients) = setup_room(&mut gateway, 3);
    let target = clients[2].id;

    gateway.dispatch(
        clients[0].id,
        ClientMessage::AdminAction {
            room_code: code.clone(),
            command: AdminCommand::Kick,
            target: Some(target),
        },
    );
    for client in clients.iter_mut().take(2) {
        match client.recv() {
            ServerEvent::RoomUpdated { room } => {
                assert_eq!(room.players.len(), 2);
                assert!(room.players.iter().all(|p| p.id != target));
            }
            other => panic!("expected RoomUpdated, got {other:?}"),
        }
    }
    clients[2].assert_silent();
}

#[test]
fn test_admin_reset_returns_room_to_lobby() {
    let mut gateway = Gateway::new();
    let (code, mut clients) = setup_room(&mut gateway, 3);
    start_game(&mut gateway, &code, &mut clients);

    gateway.dispatch(
        clients[0].id,
        ClientMessage::AdminAction {
            room_code: code,
            command: AdminCommand::Reset,
            target: None,
        },
    );
    for client in &mut clients {
        match client.recv() {
            ServerEvent::RoomUpdated { room } => {
                assert_eq!(room.status, RoomStatus::Lobby);
                assert!(room.players.iter().all(|p| p.role.is_none()));
            }
            other => panic!("expected RoomUpdated, got {other:?}"),
        }
    }
}

// -- reconnection and departure -----------------------------------------

#[test]
fn test_refresh_rejoin_preserves_role_under_new_connection() {
    let mut gateway = Gateway::new();
    let (code, mut clients) = setup_room(&mut gateway, 3);
    let snapshots = start_game(&mut gateway, &code, &mut clients);

    // p2 refreshes: a new connection joins under the same username
    // before the old socket's disconnect is reported.
    let old_id = clients[1].id;
    let old_role = own_role(&snapshots[1], old_id).unwrap();
    let old_word = snapshots[1]
        .players
        .iter()
        .find(|p| p.id == old_id)
        .and_then(|p| p.word.clone());

    let mut rejoined = connect(&mut gateway, 99);
    gateway.dispatch(
        rejoined.id,
        ClientMessage::JoinRoom {
            room_code: code.clone(),
            username: "p2".into(),
        },
    );
    match rejoined.recv() {
        ServerEvent::JoinSuccess { room } => {
            assert_eq!(room.players.len(), 3);
            let me = room.players.iter().find(|p| p.id == rejoined.id).unwrap();
            assert_eq!(me.role, Some(old_role));
            assert_eq!(me.word, old_word);
        }
        other => panic!("expected JoinSuccess, got {other:?}"),
    }

    // The stale disconnect for the superseded id changes nothing.
    gateway.disconnect(old_id);
    gateway.dispatch(
        rejoined.id,
        ClientMessage::SpyChat {
            room_code: code,
            message: "still here".into(),
        },
    );
    // Either an error (not a spy) or a relay — the room must still
    // exist and answer; a NotFound would mean it was torn down.
    rejoined.drain();
    assert_eq!(gateway.registry().room_count(), 1);
}

#[test]
fn test_last_disconnect_deletes_room() {
    let mut gateway = Gateway::new();
    let mut creator = connect(&mut gateway, 1);
    let code = create_room(&mut gateway, &mut creator, "ana");
    assert_eq!(gateway.registry().room_count(), 1);

    gateway.disconnect(creator.id);
    assert_eq!(gateway.registry().room_count(), 0);

    // A later join to the dead code fails NotFound.
    let mut late = connect(&mut gateway, 2);
    gateway.dispatch(
        late.id,
        ClientMessage::JoinRoom {
            room_code: code,
            username: "bob".into(),
        },
    );
    assert!(matches!(late.recv(), ServerEvent::Error { code: 404, .. }));
}

#[test]
fn test_creator_disconnect_promotes_next_member() {
    let mut gateway = Gateway::new();
    let (_code, mut clients) = setup_room(&mut gateway, 3);

    let promoted = clients[1].id;
    gateway.disconnect(clients[0].id);
    for client in clients.iter_mut().skip(1) {
        match client.recv() {
            ServerEvent::RoomUpdated { room } => {
                assert_eq!(room.players.len(), 2);
                assert_eq!(room.creator, promoted);
            }
            other => panic!("expected RoomUpdated, got {other:?}"),
        }
    }
}
