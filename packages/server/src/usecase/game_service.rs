//! UseCase: ゲーム進行
//!
//! ## 状態遷移
//!
//! ```text
//! lobby → roleAssignment → round → discussion → voting → results
//!   ↑                                                      │
//!   └──────────────────── reset (host) ────────────────────┘
//! ```
//!
//! ホストは `change_phase` で任意のフェーズに移せる。全員の投票が揃うと
//! 自動的に `results` へ移り、履歴への引き渡しが 1 度だけ行われる。
//!
//! 引き渡しはルームのロックと操作のタイムアウトの外で行う。ルームとゲームの
//! 書き込みはすべて先に終わっているので、履歴ストアが遅くても操作は失敗しない。

use std::sync::Arc;

use impostor_shared::time::Clock;
use uuid::Uuid;

use crate::{
    config::GameConfig,
    domain::{
        GameRecord, GameState, Phase, Pista, PistaText, PlayerId, RandomSource, Role, RoleMap,
        Room, RoomCode, RoomEvent, RoomSnapshot, RoomStore, Timestamp, VoteMap, VotingResults,
        random, turn, voting, words,
    },
};

use super::{
    common::{bounded, load_snapshot, require_game, require_room, save_room},
    error::GameError,
    history_handoff::{FinishedGame, HistoryHandoff},
    room_lock::RoomLocks,
};

/// ゲーム開始の結果（役割は個別通知に使う）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedGame {
    pub snapshot: RoomSnapshot,
    pub roles: RoleMap,
}

/// ヒント提出の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PistaAdded {
    pub pista: Pista,
    pub state: GameState,
}

/// 投票の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteOutcome {
    pub state: GameState,
    /// 記録済みの票数
    pub votes_cast: usize,
    /// 全員の投票が揃って `results` に移った場合の集計
    pub results: Option<VotingResults>,
}

/// フェーズ変更の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseChange {
    pub snapshot: RoomSnapshot,
    /// `results` に移った場合の集計
    pub results: Option<VotingResults>,
}

/// プレイヤー本人にだけ見せる役割
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRoleView {
    pub player_id: PlayerId,
    pub role: Role,
    /// インポスターには見せない
    pub secret_word: Option<String>,
}

impl PlayerRoleView {
    fn new(player_id: PlayerId, role: Role, secret_word: &str) -> Self {
        Self {
            player_id,
            role,
            secret_word: (role == Role::Normal).then(|| secret_word.to_string()),
        }
    }
}

/// 役割マップから各プレイヤーの役割ビューを作る
pub fn role_views(roles: &RoleMap, secret_word: &str) -> Vec<PlayerRoleView> {
    roles
        .iter()
        .map(|(id, role)| PlayerRoleView::new(id.clone(), *role, secret_word))
        .collect()
}

/// ゲーム進行のユースケース
pub struct GameService {
    store: Arc<dyn RoomStore>,
    locks: Arc<RoomLocks>,
    random: Arc<dyn RandomSource>,
    clock: Arc<dyn Clock>,
    handoff: Arc<HistoryHandoff>,
    config: GameConfig,
}

impl GameService {
    pub fn new(
        store: Arc<dyn RoomStore>,
        locks: Arc<RoomLocks>,
        random: Arc<dyn RandomSource>,
        clock: Arc<dyn Clock>,
        handoff: Arc<HistoryHandoff>,
        config: GameConfig,
    ) -> Self {
        Self {
            store,
            locks,
            random,
            clock,
            handoff,
            config,
        }
    }

    fn now(&self) -> Timestamp {
        Timestamp::new(self.clock.now_millis())
    }

    /// ゲームを開始する
    ///
    /// 秘密の単語とインポスターを一様に選び、現在のメンバー順を手番順として固定する。
    pub async fn start_game(
        &self,
        code: &RoomCode,
        host_id: &PlayerId,
    ) -> Result<StartedGame, GameError> {
        bounded(self.config.store_timeout, self.start_locked(code, host_id)).await
    }

    async fn start_locked(
        &self,
        code: &RoomCode,
        host_id: &PlayerId,
    ) -> Result<StartedGame, GameError> {
        let _guard = self.locks.acquire(code).await;
        let store = self.store.as_ref();
        let mut room = require_room(store, code).await?;
        if !room.is_host(host_id) {
            return Err(GameError::NotHost("start the game"));
        }
        if room.status != Phase::Lobby {
            return Err(GameError::WrongPhase {
                expected: Phase::Lobby,
                actual: room.status,
            });
        }
        let members = store.list_members(code).await?;
        let not_enough = GameError::NotEnoughPlayers {
            min: self.config.min_players,
            actual: members.len(),
        };
        if members.len() < self.config.min_players {
            return Err(not_enough);
        }

        store.delete_game(code).await?;

        let secret_word = words::pick_secret_word(self.random.as_ref());
        let impostor_id = random::choose(self.random.as_ref(), &members)
            .cloned()
            .ok_or(not_enough)?;
        let roles: RoleMap = members
            .iter()
            .map(|id| {
                let role = if *id == impostor_id {
                    Role::Impostor
                } else {
                    Role::Normal
                };
                (id.clone(), role)
            })
            .collect();
        let now = self.now();
        let state = GameState::new(
            secret_word.to_string(),
            impostor_id,
            room.config.rounds,
            members,
            now,
        );
        store.put_game_state(code, &state).await?;
        store.put_roles(code, &roles).await?;

        room.status = state.phase;
        save_room(store, &mut room, now, self.config.room_ttl).await?;
        store.publish(RoomEvent::PhaseChanged {
            code: code.clone(),
            phase: state.phase,
        });

        tracing::info!(
            "Game started in room '{}' with {} players",
            code,
            roles.len()
        );
        Ok(StartedGame {
            snapshot: load_snapshot(store, room).await?,
            roles,
        })
    }

    /// 手番のプレイヤーがヒントを提出する
    pub async fn add_pista(
        &self,
        code: &RoomCode,
        player_id: &PlayerId,
        text: PistaText,
    ) -> Result<PistaAdded, GameError> {
        bounded(
            self.config.store_timeout,
            self.add_pista_locked(code, player_id, text),
        )
        .await
    }

    async fn add_pista_locked(
        &self,
        code: &RoomCode,
        player_id: &PlayerId,
        text: PistaText,
    ) -> Result<PistaAdded, GameError> {
        let _guard = self.locks.acquire(code).await;
        let store = self.store.as_ref();
        let mut state = require_game(store, code).await?;
        if state.phase != Phase::Round {
            return Err(GameError::WrongPhase {
                expected: Phase::Round,
                actual: state.phase,
            });
        }
        text.ensure_hides(&state.secret_word)?;

        if turn::current_player(&mut state).as_ref() != Some(player_id) {
            tracing::warn!(
                "Player '{}' submitted a clue out of turn in room '{}'",
                player_id,
                code
            );
            return Err(GameError::NotYourTurn);
        }
        let player = store
            .get_player(code, player_id)
            .await?
            .ok_or_else(|| GameError::PlayerNotFound(player_id.to_string()))?;

        let now = self.now();
        let pista = Pista {
            id: Uuid::new_v4().to_string(),
            player_id: player_id.clone(),
            player_name: player.name.into_string(),
            text: text.into_string(),
            round: state.current_round,
            turn: state.current_turn,
            created_at: now,
        };
        store.append_pista(code, &pista).await?;
        turn::advance_player(&mut state);
        store.put_game_state(code, &state).await?;
        self.touch(code, now).await?;

        tracing::debug!(
            "Clue from '{}' recorded in room '{}' (round {}, turn {})",
            player_id,
            code,
            pista.round,
            pista.turn
        );
        Ok(PistaAdded { pista, state })
    }

    /// 手番のプレイヤーが投票する
    ///
    /// 同じ投票者の再投票は上書き。手番順の全員の投票が揃うと `results` に移る。
    pub async fn add_vote(
        &self,
        code: &RoomCode,
        voter_id: &PlayerId,
        target_id: &PlayerId,
    ) -> Result<VoteOutcome, GameError> {
        let (mut outcome, record) = bounded(
            self.config.store_timeout,
            self.add_vote_locked(code, voter_id, target_id),
        )
        .await?;
        if let Some(record) = record {
            outcome.state.history_id = self.record_history(code, record).await;
        }
        Ok(outcome)
    }

    async fn add_vote_locked(
        &self,
        code: &RoomCode,
        voter_id: &PlayerId,
        target_id: &PlayerId,
    ) -> Result<(VoteOutcome, Option<GameRecord>), GameError> {
        let _guard = self.locks.acquire(code).await;
        let store = self.store.as_ref();
        let mut state = require_game(store, code).await?;
        if state.phase != Phase::Voting {
            return Err(GameError::WrongPhase {
                expected: Phase::Voting,
                actual: state.phase,
            });
        }
        if turn::current_voter(&mut state).as_ref() != Some(voter_id) {
            tracing::warn!(
                "Player '{}' voted out of turn in room '{}'",
                voter_id,
                code
            );
            return Err(GameError::NotYourTurn);
        }
        if voter_id == target_id {
            return Err(GameError::SelfVoteNotAllowed);
        }
        if !state.is_participant(target_id) {
            return Err(GameError::PlayerNotFound(target_id.to_string()));
        }

        store.put_vote(code, voter_id, target_id).await?;
        turn::advance_voter(&mut state);
        let votes = voting::cast_by(&store.get_votes(code).await?, &state.turn_order);

        let now = self.now();
        let mut room = require_room(store, code).await?;
        let mut record = None;
        let results = if voting::all_voted(&state.turn_order, &votes) {
            tracing::info!("All votes are in for room '{}'", code);
            let (results, finished) = self.finish_game(code, &mut state, &votes, now).await?;
            record = finished;
            room.status = Phase::Results;
            Some(results)
        } else {
            store.put_game_state(code, &state).await?;
            None
        };
        save_room(store, &mut room, now, self.config.room_ttl).await?;
        if results.is_some() {
            store.publish(RoomEvent::PhaseChanged {
                code: code.clone(),
                phase: Phase::Results,
            });
        }

        let outcome = VoteOutcome {
            state,
            votes_cast: votes.len(),
            results,
        };
        Ok((outcome, record))
    }

    /// ホストがフェーズを切り替える
    ///
    /// - `voting` に入ると投票の手番を先頭に戻す
    /// - `results` に入ると集計し、未実施なら履歴へ引き渡す
    /// - `lobby` はリセットとして扱う
    pub async fn change_phase(
        &self,
        code: &RoomCode,
        phase: Phase,
        player_id: &PlayerId,
    ) -> Result<PhaseChange, GameError> {
        let (mut change, record) = bounded(
            self.config.store_timeout,
            self.change_phase_locked(code, phase, player_id),
        )
        .await?;
        if let Some(record) = record {
            let history_id = self.record_history(code, record).await;
            if let Some(state) = change.snapshot.game_state.as_mut() {
                state.history_id = history_id;
            }
        }
        Ok(change)
    }

    async fn change_phase_locked(
        &self,
        code: &RoomCode,
        phase: Phase,
        player_id: &PlayerId,
    ) -> Result<(PhaseChange, Option<GameRecord>), GameError> {
        let _guard = self.locks.acquire(code).await;
        let store = self.store.as_ref();
        let mut room = require_room(store, code).await?;
        if !room.is_host(player_id) {
            return Err(GameError::NotHost("change the phase"));
        }
        let now = self.now();

        if phase == Phase::Lobby {
            self.reset_in_place(&mut room, now).await?;
            let change = PhaseChange {
                snapshot: load_snapshot(store, room).await?,
                results: None,
            };
            return Ok((change, None));
        }

        let mut state = require_game(store, code).await?;
        let mut results = None;
        let mut record = None;
        match phase {
            Phase::Results => {
                let votes = store.get_votes(code).await?;
                let (finished, pending) = self.finish_game(code, &mut state, &votes, now).await?;
                results = Some(finished);
                record = pending;
            }
            Phase::Voting => {
                state.phase = phase;
                state.current_voter_index = 0;
                store.put_game_state(code, &state).await?;
            }
            _ => {
                state.phase = phase;
                store.put_game_state(code, &state).await?;
            }
        }

        room.status = phase;
        save_room(store, &mut room, now, self.config.room_ttl).await?;
        store.publish(RoomEvent::PhaseChanged {
            code: code.clone(),
            phase,
        });
        tracing::info!("Room '{}' moved to phase '{}'", code, phase);

        let change = PhaseChange {
            snapshot: load_snapshot(store, room).await?,
            results,
        };
        Ok((change, record))
    }

    /// 現在の投票の集計
    pub async fn get_voting_results(&self, code: &RoomCode) -> Result<VotingResults, GameError> {
        bounded(self.config.store_timeout, self.voting_results_unlocked(code)).await
    }

    async fn voting_results_unlocked(&self, code: &RoomCode) -> Result<VotingResults, GameError> {
        let store = self.store.as_ref();
        let state = require_game(store, code).await?;
        let votes = voting::cast_by(&store.get_votes(code).await?, &state.turn_order);
        Ok(voting::resolve(&votes, &state.impostor_id))
    }

    /// ホストが次のラウンドを始める
    pub async fn next_round(
        &self,
        code: &RoomCode,
        host_id: &PlayerId,
    ) -> Result<GameState, GameError> {
        bounded(self.config.store_timeout, self.next_round_locked(code, host_id)).await
    }

    async fn next_round_locked(
        &self,
        code: &RoomCode,
        host_id: &PlayerId,
    ) -> Result<GameState, GameError> {
        let _guard = self.locks.acquire(code).await;
        let store = self.store.as_ref();
        let mut room = require_room(store, code).await?;
        if !room.is_host(host_id) {
            return Err(GameError::NotHost("start the next round"));
        }
        let mut state = require_game(store, code).await?;
        if state.phase == Phase::Results {
            return Err(GameError::GameFinished);
        }
        if state.is_final_round() {
            return Err(GameError::FinalRoundReached(state.current_round));
        }

        state.current_round += 1;
        state.current_player_index = 0;
        state.current_voter_index = 0;
        state.current_turn = 1;
        state.phase = Phase::Round;
        store.clear_votes(code).await?;
        store.put_game_state(code, &state).await?;

        room.status = Phase::Round;
        save_room(store, &mut room, self.now(), self.config.room_ttl).await?;
        store.publish(RoomEvent::PhaseChanged {
            code: code.clone(),
            phase: Phase::Round,
        });
        tracing::info!("Room '{}' started round {}", code, state.current_round);
        Ok(state)
    }

    /// ホストがゲームを破棄してロビーに戻す
    pub async fn reset_game(
        &self,
        code: &RoomCode,
        host_id: &PlayerId,
    ) -> Result<RoomSnapshot, GameError> {
        bounded(self.config.store_timeout, self.reset_locked(code, host_id)).await
    }

    async fn reset_locked(
        &self,
        code: &RoomCode,
        host_id: &PlayerId,
    ) -> Result<RoomSnapshot, GameError> {
        let _guard = self.locks.acquire(code).await;
        let store = self.store.as_ref();
        let mut room = require_room(store, code).await?;
        if !room.is_host(host_id) {
            return Err(GameError::NotHost("reset the game"));
        }
        self.reset_in_place(&mut room, self.now()).await?;
        Ok(load_snapshot(store, room).await?)
    }

    /// プレイヤー本人の役割（普通のプレイヤーにだけ秘密の単語を含める）
    pub async fn get_player_role(
        &self,
        code: &RoomCode,
        player_id: &PlayerId,
    ) -> Result<PlayerRoleView, GameError> {
        bounded(self.config.store_timeout, self.role_unlocked(code, player_id)).await
    }

    async fn role_unlocked(
        &self,
        code: &RoomCode,
        player_id: &PlayerId,
    ) -> Result<PlayerRoleView, GameError> {
        let store = self.store.as_ref();
        let state = require_game(store, code).await?;
        let roles = store
            .get_roles(code)
            .await?
            .ok_or_else(|| GameError::GameNotFound(code.to_string()))?;
        let role = roles
            .get(player_id)
            .copied()
            .ok_or_else(|| GameError::PlayerNotFound(player_id.to_string()))?;
        Ok(PlayerRoleView::new(
            player_id.clone(),
            role,
            &state.secret_word,
        ))
    }

    /// 提出順のヒント一覧
    pub async fn get_pistas(&self, code: &RoomCode) -> Result<Vec<Pista>, GameError> {
        bounded(self.config.store_timeout, self.pistas_unlocked(code)).await
    }

    async fn pistas_unlocked(&self, code: &RoomCode) -> Result<Vec<Pista>, GameError> {
        let store = self.store.as_ref();
        require_room(store, code).await?;
        Ok(store.list_pistas(code).await?)
    }

    async fn touch(&self, code: &RoomCode, now: Timestamp) -> Result<(), GameError> {
        let store = self.store.as_ref();
        let mut room = require_room(store, code).await?;
        save_room(store, &mut room, now, self.config.room_ttl).await?;
        Ok(())
    }

    async fn reset_in_place(&self, room: &mut Room, now: Timestamp) -> Result<(), GameError> {
        let store = self.store.as_ref();
        store.delete_game(&room.code).await?;
        room.status = Phase::Lobby;
        save_room(store, room, now, self.config.room_ttl).await?;
        store.publish(RoomEvent::PhaseChanged {
            code: room.code.clone(),
            phase: Phase::Lobby,
        });
        tracing::info!("Game in room '{}' reset to lobby", room.code);
        Ok(())
    }

    /// `results` に移して集計し、未実施なら引き渡す記録を組み立てる
    ///
    /// 引き渡し済みの印はここで保存する。記録の保存は呼び出し側がロックの外で行う。
    async fn finish_game(
        &self,
        code: &RoomCode,
        state: &mut GameState,
        votes: &VoteMap,
        now: Timestamp,
    ) -> Result<(VotingResults, Option<GameRecord>), GameError> {
        let store = self.store.as_ref();
        let votes = voting::cast_by(votes, &state.turn_order);
        let results = voting::resolve(&votes, &state.impostor_id);
        state.phase = Phase::Results;

        if state.handed_off {
            store.put_game_state(code, state).await?;
            return Ok((results, None));
        }
        state.handed_off = true;
        store.put_game_state(code, state).await?;

        let roles = store.get_roles(code).await?.unwrap_or_default();
        let pistas = store.list_pistas(code).await?;
        let mut players = Vec::with_capacity(state.turn_order.len());
        for id in &state.turn_order {
            if let Some(player) = store.get_player(code, id).await? {
                players.push(player);
            }
        }
        let record = FinishedGame {
            code,
            state: &*state,
            roles: &roles,
            players: &players,
            pistas: &pistas,
            votes: &votes,
            results: &results,
            finished_at: now,
        }
        .to_record();

        tracing::info!(
            "Game in room '{}' finished, winner: {:?}",
            code,
            results.winner
        );
        Ok((results, Some(record)))
    }

    /// 記録を履歴へ引き渡し、保存された ID を返す
    ///
    /// 引き渡しは別タスクで走らせ、`store_timeout` だけ待つ。間に合わなければ
    /// `None` を返し、タスクは裏で続けて保存後に ID をゲーム状態へ書き戻す。
    async fn record_history(&self, code: &RoomCode, record: GameRecord) -> Option<String> {
        let task = tokio::spawn(link_history(
            self.store.clone(),
            self.locks.clone(),
            self.handoff.clone(),
            code.clone(),
            record,
        ));
        match tokio::time::timeout(self.config.store_timeout, task).await {
            Ok(Ok(history_id)) => history_id,
            Ok(Err(e)) => {
                tracing::error!("History hand-off for room '{}' aborted: {}", code, e);
                None
            }
            Err(_) => {
                tracing::warn!(
                    "History hand-off for room '{}' still running after {:?}",
                    code,
                    self.config.store_timeout
                );
                None
            }
        }
    }
}

/// 記録を保存し、同じゲームが残っていればその ID をゲーム状態に書き戻す
async fn link_history(
    store: Arc<dyn RoomStore>,
    locks: Arc<RoomLocks>,
    handoff: Arc<HistoryHandoff>,
    code: RoomCode,
    record: GameRecord,
) -> Option<String> {
    let started_at = Timestamp::new(record.started_at);
    let history_id = handoff.hand_off(record).await?;

    let _guard = locks.acquire(&code).await;
    match store.get_game_state(&code).await {
        Ok(Some(mut state)) if state.started_at == started_at => {
            state.history_id = Some(history_id.clone());
            if let Err(e) = store.put_game_state(&code, &state).await {
                tracing::error!(
                    "Failed to link history '{}' to room '{}': {}",
                    history_id,
                    code,
                    e
                );
            }
        }
        Ok(_) => {
            tracing::debug!(
                "Game in room '{}' ended before history '{}' was linked",
                code,
                history_id
            );
        }
        Err(e) => {
            tracing::error!(
                "Failed to link history '{}' to room '{}': {}",
                history_id,
                code,
                e
            );
        }
    }
    Some(history_id)
}
