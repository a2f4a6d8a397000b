//! End-to-end game flows driven through the room and game services.

use std::{sync::Arc, time::Duration};

use impostor_server::{
    config::GameConfig,
    domain::{
        GameHistory, Phase, PistaText, PlayerId, PlayerName, Role, RoomCode, RoomConfig,
        RoomEvent, RoomStore, SearchIndex, SequenceRandom, ThreadRandom, Winner,
    },
    infrastructure::{
        history::{InMemoryGameHistory, InMemorySearchIndex},
        repository::InMemoryRoomStore,
    },
    usecase::{GameError, GameService, HistoryHandoff, LeaveOutcome, RoomLocks, RoomService},
};
use impostor_shared::time::ManualClock;

const START_MILLIS: i64 = 1_700_000_000_000;

struct Engine {
    rooms: RoomService,
    games: GameService,
    store: Arc<InMemoryRoomStore>,
    history: Arc<InMemoryGameHistory>,
    search: Arc<InMemorySearchIndex>,
    clock: Arc<ManualClock>,
}

/// 秘密の単語は "hospital"、インポスターは手番順の 3 番目になる
fn engine() -> Engine {
    let clock = Arc::new(ManualClock::new(START_MILLIS));
    let store = Arc::new(InMemoryRoomStore::new(clock.clone()));
    let locks = Arc::new(RoomLocks::new());
    let history = Arc::new(InMemoryGameHistory::new());
    let search = Arc::new(InMemorySearchIndex::new());
    let config = GameConfig::default();

    let rooms = RoomService::new(
        store.clone(),
        locks.clone(),
        Arc::new(ThreadRandom),
        clock.clone(),
        config,
    );
    let games = GameService::new(
        store.clone(),
        locks,
        Arc::new(SequenceRandom::new(vec![2, 2])),
        clock.clone(),
        Arc::new(HistoryHandoff::new(history.clone(), search.clone())),
        config,
    );
    Engine {
        rooms,
        games,
        store,
        history,
        search,
        clock,
    }
}

fn id(value: &str) -> PlayerId {
    PlayerId::new(value.to_string()).unwrap()
}

fn name(value: &str) -> PlayerName {
    PlayerName::new(value.to_string()).unwrap()
}

fn clue(text: &str) -> PistaText {
    PistaText::new(text.to_string()).unwrap()
}

/// Ana がホストのルームに Beto と Caro が参加した状態
async fn room_of_three(e: &Engine) -> RoomCode {
    let created = e
        .rooms
        .create_room(id("ana"), name("Ana"), RoomConfig::new(Some(2)).unwrap())
        .await
        .unwrap();
    let code = created.room.code.clone();
    e.rooms
        .join_room(&code, id("beto"), name("Beto"))
        .await
        .unwrap();
    e.rooms
        .join_room(&code, id("caro"), name("Caro"))
        .await
        .unwrap();
    code
}

/// ゲームを開始し、全員がヒントを出して投票フェーズに入る
async fn play_until_voting(e: &Engine, code: &RoomCode) {
    e.games.start_game(code, &id("ana")).await.unwrap();
    e.games
        .change_phase(code, Phase::Round, &id("ana"))
        .await
        .unwrap();
    for (player, text) in [("ana", "agujas"), ("beto", "camilla"), ("caro", "blanco")] {
        e.games.add_pista(code, &id(player), clue(text)).await.unwrap();
    }
    e.games
        .change_phase(code, Phase::Voting, &id("ana"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_full_game_players_win() {
    // テスト項目: 作成から結果までの一連の流れで、インポスターを当てれば普通のプレイヤーが勝つ
    // given (前提条件):
    let e = engine();
    let code = room_of_three(&e).await;

    // when (操作): ゲーム開始
    let started = e.games.start_game(&code, &id("ana")).await.unwrap();

    // then (期待する結果): 役割が配られ、本人だけが自分の役割を見られる
    assert_eq!(started.snapshot.room.status, Phase::RoleAssignment);
    assert_eq!(started.roles.get(&id("caro")), Some(&Role::Impostor));
    let ana_role = e.games.get_player_role(&code, &id("ana")).await.unwrap();
    assert_eq!(ana_role.secret_word.as_deref(), Some("hospital"));
    let caro_role = e.games.get_player_role(&code, &id("caro")).await.unwrap();
    assert_eq!(caro_role.secret_word, None);

    // when (操作): ヒントの提出（手番外の提出は拒否される）
    e.games
        .change_phase(&code, Phase::Round, &id("ana"))
        .await
        .unwrap();
    let out_of_turn = e.games.add_pista(&code, &id("beto"), clue("camilla")).await;
    for (player, text) in [("ana", "agujas"), ("beto", "camilla"), ("caro", "blanco")] {
        e.games.add_pista(&code, &id(player), clue(text)).await.unwrap();
    }

    // then (期待する結果): 一周して手番が先頭に戻り、ターンが進む
    assert_eq!(out_of_turn, Err(GameError::NotYourTurn));
    let pistas = e.games.get_pistas(&code).await.unwrap();
    assert_eq!(pistas.len(), 3);
    let snapshot = e.rooms.get_room_state(&code).await.unwrap();
    let game = snapshot.game_state.unwrap();
    assert_eq!(game.current_player_index, 0);
    assert_eq!(game.current_turn, 2);

    // when (操作): 全員が投票
    e.games
        .change_phase(&code, Phase::Voting, &id("ana"))
        .await
        .unwrap();
    e.games.add_vote(&code, &id("ana"), &id("caro")).await.unwrap();
    e.games.add_vote(&code, &id("beto"), &id("caro")).await.unwrap();
    let last = e.games.add_vote(&code, &id("caro"), &id("ana")).await.unwrap();

    // then (期待する結果): 自動で結果に移り、履歴に 1 件保存される
    let results = last.results.unwrap();
    assert_eq!(results.most_voted, Some(id("caro")));
    assert_eq!(results.winner, Winner::Players);
    assert_eq!(last.state.phase, Phase::Results);
    let history_id = last.state.history_id.clone().unwrap();
    let record = e.history.get_game(&history_id).await.unwrap().unwrap();
    assert_eq!(record.secret_word, "hospital");
    assert_eq!(record.pistas.len(), 3);
    let hits = e.search.search_games("hospital").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(
        e.search.get_user("ana").await.map(|user| user.games_won),
        Some(1)
    );
}

#[tokio::test]
async fn test_hand_off_happens_once() {
    // テスト項目: 自動で結果に移った後にホストが結果フェーズを指定しても、引き渡しは 1 回だけ
    // given (前提条件):
    let e = engine();
    let code = room_of_three(&e).await;
    play_until_voting(&e, &code).await;
    e.games.add_vote(&code, &id("ana"), &id("caro")).await.unwrap();
    e.games.add_vote(&code, &id("beto"), &id("caro")).await.unwrap();
    e.games.add_vote(&code, &id("caro"), &id("ana")).await.unwrap();

    // when (操作):
    let change = e
        .games
        .change_phase(&code, Phase::Results, &id("ana"))
        .await
        .unwrap();

    // then (期待する結果):
    assert_eq!(change.results.map(|r| r.winner), Some(Winner::Players));
    assert_eq!(e.history.count().await, 1);
}

#[tokio::test]
async fn test_tie_means_impostor_wins() {
    // テスト項目: 票が割れて最多得票者が決まらなければインポスターの勝ち
    // given (前提条件):
    let e = engine();
    let code = room_of_three(&e).await;
    play_until_voting(&e, &code).await;

    // when (操作):
    e.games.add_vote(&code, &id("ana"), &id("beto")).await.unwrap();
    e.games.add_vote(&code, &id("beto"), &id("caro")).await.unwrap();
    let last = e.games.add_vote(&code, &id("caro"), &id("ana")).await.unwrap();

    // then (期待する結果):
    let results = last.results.unwrap();
    assert!(results.is_tie);
    assert_eq!(results.most_voted, None);
    assert_eq!(results.winner, Winner::Impostor);
}

#[tokio::test]
async fn test_next_round_and_reset() {
    // テスト項目: 次のラウンドは最終ラウンドで止まり、リセットでロビーに戻る
    // given (前提条件): 2 ラウンドのルーム
    let e = engine();
    let code = room_of_three(&e).await;
    e.games.start_game(&code, &id("ana")).await.unwrap();

    // when (操作):
    let second = e.games.next_round(&code, &id("ana")).await.unwrap();
    let third = e.games.next_round(&code, &id("ana")).await;
    let by_guest = e.games.reset_game(&code, &id("beto")).await;
    let reset = e.games.reset_game(&code, &id("ana")).await.unwrap();

    // then (期待する結果):
    assert_eq!(second.current_round, 2);
    assert_eq!(second.phase, Phase::Round);
    assert_eq!(third, Err(GameError::FinalRoundReached(2)));
    assert!(matches!(by_guest, Err(GameError::NotHost(_))));
    assert_eq!(reset.room.status, Phase::Lobby);
    assert_eq!(reset.game_state, None);
    assert!(e.games.get_pistas(&code).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_host_leaves_mid_game() {
    // テスト項目: 進行中にホストが抜けると次のメンバーがホストになり、手番順からも外れる
    // given (前提条件):
    let e = engine();
    let code = room_of_three(&e).await;
    e.games.start_game(&code, &id("ana")).await.unwrap();
    e.games
        .change_phase(&code, Phase::Round, &id("ana"))
        .await
        .unwrap();

    // when (操作):
    let outcome = e.rooms.leave_room(&code, &id("ana")).await.unwrap();

    // then (期待する結果):
    let LeaveOutcome::Left { snapshot, new_host } = outcome else {
        panic!("room should survive");
    };
    assert_eq!(new_host, Some(id("beto")));
    assert_eq!(snapshot.room.host_id, id("beto"));
    let game = snapshot.game_state.unwrap();
    assert_eq!(game.turn_order, vec![id("beto"), id("caro")]);
    e.games
        .add_pista(&code, &id("beto"), clue("camilla"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_last_member_leaving_deletes_room() {
    // テスト項目: 最後のメンバーが抜けるとルームは削除される
    // given (前提条件):
    let e = engine();
    let created = e
        .rooms
        .create_room(id("ana"), name("Ana"), RoomConfig::default())
        .await
        .unwrap();
    let code = created.room.code;

    // when (操作):
    let outcome = e.rooms.leave_room(&code, &id("ana")).await.unwrap();

    // then (期待する結果):
    assert_eq!(outcome, LeaveOutcome::RoomDeleted);
    assert!(matches!(
        e.rooms.get_room_state(&code).await,
        Err(GameError::RoomNotFound(_))
    ));
}

#[tokio::test]
async fn test_idle_room_expires() {
    // テスト項目: 最後の操作から TTL を過ぎたルームは掃除され、Expired が配信される
    // given (前提条件):
    let e = engine();
    let mut events = e.store.subscribe();
    let code = room_of_three(&e).await;
    let ttl = GameConfig::default().room_ttl;

    // when (操作):
    e.clock
        .advance_millis((ttl + Duration::from_secs(1)).as_millis() as i64);
    let purged = e.rooms.purge_expired().await.unwrap();

    // then (期待する結果):
    assert_eq!(purged, vec![code.clone()]);
    assert!(matches!(
        e.rooms.get_room_state(&code).await,
        Err(GameError::RoomNotFound(_))
    ));
    let mut expired = false;
    while let Ok(event) = events.try_recv() {
        if event == (RoomEvent::Expired { code: code.clone() }) {
            expired = true;
        }
    }
    assert!(expired);
}
