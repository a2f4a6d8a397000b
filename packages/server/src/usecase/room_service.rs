//! UseCase: ルームのライフサイクル
//!
//! 作成・参加・退出・状態取得（自己修復つき）・削除・期限切れの掃除。
//! 状態を変更する操作はすべてルーム単位のロックの下で実行される。

use std::sync::Arc;

use impostor_shared::time::Clock;
use tokio::sync::OwnedMutexGuard;

use crate::{
    config::GameConfig,
    domain::{
        Phase, Player, PlayerId, PlayerName, RandomSource, Room, RoomCode, RoomCodeFactory,
        RoomConfig, RoomEvent, RoomSnapshot, RoomStore, Timestamp, turn,
    },
};

use super::{
    common::{bounded, load_snapshot, require_room, save_room},
    error::GameError,
    room_lock::RoomLocks,
};

/// 退出の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// ルームは残っている（ホストが移った場合は `new_host`）
    Left {
        snapshot: RoomSnapshot,
        new_host: Option<PlayerId>,
    },
    /// 最後のメンバーが抜けてルームが削除された
    RoomDeleted,
}

/// ルームのライフサイクルを扱うユースケース
pub struct RoomService {
    store: Arc<dyn RoomStore>,
    locks: Arc<RoomLocks>,
    random: Arc<dyn RandomSource>,
    clock: Arc<dyn Clock>,
    config: GameConfig,
    codes: RoomCodeFactory,
}

impl RoomService {
    pub fn new(
        store: Arc<dyn RoomStore>,
        locks: Arc<RoomLocks>,
        random: Arc<dyn RandomSource>,
        clock: Arc<dyn Clock>,
        config: GameConfig,
    ) -> Self {
        Self {
            store,
            locks,
            random,
            clock,
            codes: RoomCodeFactory::new(config.code_length),
            config,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// 外部から受け取ったルームコードを正規化・検証する
    pub fn parse_code(&self, raw: &str) -> Result<RoomCode, GameError> {
        Ok(self.codes.parse(raw)?)
    }

    fn now(&self) -> Timestamp {
        Timestamp::new(self.clock.now_millis())
    }

    /// ルームを作成し、作成者をホストとして参加させる
    ///
    /// # Returns
    ///
    /// * `Ok(RoomSnapshot)` - `lobby` 状態でホスト 1 人だけのルーム
    /// * `Err(GameError::CodeGenerationExhausted)` - 未使用のコードが見つからなかった
    pub async fn create_room(
        &self,
        host_id: PlayerId,
        host_name: PlayerName,
        config: RoomConfig,
    ) -> Result<RoomSnapshot, GameError> {
        bounded(
            self.config.store_timeout,
            self.create_locked(host_id, host_name, config),
        )
        .await
    }

    async fn create_locked(
        &self,
        host_id: PlayerId,
        host_name: PlayerName,
        config: RoomConfig,
    ) -> Result<RoomSnapshot, GameError> {
        let (code, _guard) = self.allocate_code().await?;
        let store = self.store.as_ref();

        // 同じコードで残っている古いキーを消す
        store.delete_room(&code).await?;

        let now = self.now();
        let mut room = Room::new(code.clone(), host_id.clone(), config, now);
        let host = Player::new(host_id, host_name, now, true);
        store.put_player(&code, &host).await?;
        store.add_member(&code, &host.id).await?;
        save_room(store, &mut room, now, self.config.room_ttl).await?;
        store.publish(RoomEvent::Created { code: code.clone() });

        tracing::info!("Room '{}' created by '{}'", code, host.id);
        Ok(RoomSnapshot {
            room,
            players: vec![host],
            game_state: None,
        })
    }

    /// 未使用のコードを生成し、そのコードのロックを保持したまま返す
    async fn allocate_code(&self) -> Result<(RoomCode, OwnedMutexGuard<()>), GameError> {
        for attempt in 1..=self.config.max_code_attempts {
            let code = self.codes.generate(self.random.as_ref());
            let guard = self.locks.acquire(&code).await;
            if !self.store.room_exists(&code).await? {
                return Ok((code, guard));
            }
            tracing::debug!("Room code '{}' is taken (attempt {})", code, attempt);
        }
        tracing::error!(
            "No free room code after {} attempts",
            self.config.max_code_attempts
        );
        Err(GameError::CodeGenerationExhausted(
            self.config.max_code_attempts,
        ))
    }

    /// ルームに参加する
    pub async fn join_room(
        &self,
        code: &RoomCode,
        player_id: PlayerId,
        player_name: PlayerName,
    ) -> Result<RoomSnapshot, GameError> {
        bounded(
            self.config.store_timeout,
            self.join_locked(code, player_id, player_name),
        )
        .await
    }

    async fn join_locked(
        &self,
        code: &RoomCode,
        player_id: PlayerId,
        player_name: PlayerName,
    ) -> Result<RoomSnapshot, GameError> {
        let _guard = self.locks.acquire(code).await;
        let store = self.store.as_ref();
        let mut room = require_room(store, code).await?;

        let members = store.list_members(code).await?;
        if members.len() >= self.config.max_players {
            tracing::warn!("Room '{}' is full, rejected '{}'", code, player_id);
            return Err(GameError::RoomFull(self.config.max_players));
        }
        if members.contains(&player_id) {
            return Err(GameError::DuplicatePlayer(player_id.into_string()));
        }

        let now = self.now();
        let player = Player::new(player_id.clone(), player_name, now, false);
        store.put_player(code, &player).await?;
        store.add_member(code, &player_id).await?;
        save_room(store, &mut room, now, self.config.room_ttl).await?;
        store.publish(RoomEvent::PlayerJoined {
            code: code.clone(),
            player_id: player_id.clone(),
        });

        tracing::info!("Player '{}' joined room '{}'", player_id, code);
        Ok(load_snapshot(store, room).await?)
    }

    /// ルームから退出する
    ///
    /// ホストが抜けた場合は残ったメンバーの先頭（参加順）が新しいホストになる。
    /// 最後のメンバーが抜けた場合はルームとその派生キーをすべて削除する。
    pub async fn leave_room(
        &self,
        code: &RoomCode,
        player_id: &PlayerId,
    ) -> Result<LeaveOutcome, GameError> {
        bounded(self.config.store_timeout, self.leave_locked(code, player_id)).await
    }

    async fn leave_locked(
        &self,
        code: &RoomCode,
        player_id: &PlayerId,
    ) -> Result<LeaveOutcome, GameError> {
        let _guard = self.locks.acquire(code).await;
        let store = self.store.as_ref();
        let mut room = require_room(store, code).await?;

        let members = store.list_members(code).await?;
        if !members.contains(player_id) {
            return Err(GameError::PlayerNotFound(player_id.to_string()));
        }
        store.remove_member(code, player_id).await?;
        store.delete_player(code, player_id).await?;
        tracing::info!("Player '{}' left room '{}'", player_id, code);

        let remaining: Vec<PlayerId> = members.into_iter().filter(|id| id != player_id).collect();
        let Some(next_host) = remaining.first() else {
            store.delete_room(code).await?;
            store.publish(RoomEvent::Deleted { code: code.clone() });
            tracing::info!("Room '{}' deleted, no members left", code);
            return Ok(LeaveOutcome::RoomDeleted);
        };

        let mut new_host = None;
        if room.is_host(player_id) {
            if let Some(mut player) = store.get_player(code, next_host).await? {
                player.is_host = true;
                store.put_player(code, &player).await?;
            }
            room.host_id = next_host.clone();
            new_host = Some(next_host.clone());
            store.publish(RoomEvent::HostChanged {
                code: code.clone(),
                host_id: next_host.clone(),
            });
            tracing::info!("Host of room '{}' moved to '{}'", code, next_host);
        }

        if let Some(mut state) = store.get_game_state(code).await? {
            if state.impostor_id == *player_id && state.phase != Phase::Results {
                // インポスターがいなければ誰も当てられないのでゲームを畳む
                store.delete_game(code).await?;
                room.status = Phase::Lobby;
                store.publish(RoomEvent::PhaseChanged {
                    code: code.clone(),
                    phase: Phase::Lobby,
                });
                tracing::info!("Impostor left room '{}', game reset to lobby", code);
            } else if turn::remove_from_turn_order(&mut state, player_id) {
                store.put_game_state(code, &state).await?;
                tracing::debug!("Removed '{}' from the turn order of '{}'", player_id, code);
            }
        }

        save_room(store, &mut room, self.now(), self.config.room_ttl).await?;
        store.publish(RoomEvent::PlayerLeft {
            code: code.clone(),
            player_id: player_id.clone(),
        });

        Ok(LeaveOutcome::Left {
            snapshot: load_snapshot(store, room).await?,
            new_host,
        })
    }

    /// ルームの集約状態を返す
    ///
    /// 読み取りの際に次の不整合を修復する（いずれも warn で記録）。
    /// - `lobby` なのにゲーム状態がある → ゲーム状態を削除
    /// - ゲーム状態が無いのに `lobby` 以外 → `lobby` に戻す
    /// - ルームの状態とゲームのフェーズが食い違う → ゲームのフェーズに合わせる
    pub async fn get_room_state(&self, code: &RoomCode) -> Result<RoomSnapshot, GameError> {
        bounded(self.config.store_timeout, self.state_locked(code)).await
    }

    async fn state_locked(&self, code: &RoomCode) -> Result<RoomSnapshot, GameError> {
        let _guard = self.locks.acquire(code).await;
        let store = self.store.as_ref();
        let mut room = require_room(store, code).await?;

        let game_phase = store.get_game_state(code).await?.map(|state| state.phase);
        match (game_phase, room.status) {
            (Some(_), Phase::Lobby) => {
                tracing::warn!(
                    "Room '{}' is in lobby but holds a game state, purging it",
                    code
                );
                store.delete_game(code).await?;
            }
            (None, status) if status != Phase::Lobby => {
                tracing::warn!(
                    "Room '{}' is in '{}' without a game state, resetting to lobby",
                    code,
                    status
                );
                room.status = Phase::Lobby;
                store.put_room(&room).await?;
            }
            (Some(phase), status) if phase != status => {
                tracing::warn!(
                    "Room '{}' is in '{}' but its game is in '{}', realigning",
                    code,
                    status,
                    phase
                );
                room.status = phase;
                store.put_room(&room).await?;
            }
            _ => {}
        }

        Ok(load_snapshot(store, room).await?)
    }

    /// ホストがルームを削除する
    pub async fn delete_room(&self, code: &RoomCode, requester: &PlayerId) -> Result<(), GameError> {
        bounded(self.config.store_timeout, self.delete_locked(code, requester)).await
    }

    async fn delete_locked(&self, code: &RoomCode, requester: &PlayerId) -> Result<(), GameError> {
        let _guard = self.locks.acquire(code).await;
        let store = self.store.as_ref();
        let room = require_room(store, code).await?;
        if !room.is_host(requester) {
            return Err(GameError::NotHost("delete the room"));
        }
        store.delete_room(code).await?;
        store.publish(RoomEvent::Deleted { code: code.clone() });
        tracing::info!("Room '{}' deleted by host '{}'", code, requester);
        Ok(())
    }

    /// 生存中のルームを作成順に返す（読み取りのみ）
    pub async fn list_rooms(&self) -> Result<Vec<RoomSnapshot>, GameError> {
        bounded(self.config.store_timeout, self.list_unlocked()).await
    }

    async fn list_unlocked(&self) -> Result<Vec<RoomSnapshot>, GameError> {
        let store = self.store.as_ref();
        let mut snapshots = Vec::new();
        for code in store.list_room_codes().await? {
            if let Some(room) = store.get_room(&code).await? {
                snapshots.push(load_snapshot(store, room).await?);
            }
        }
        snapshots.sort_by(|a, b| {
            a.room
                .created_at
                .cmp(&b.room.created_at)
                .then_with(|| a.room.code.cmp(&b.room.code))
        });
        Ok(snapshots)
    }

    /// 期限切れのルームを削除し、削除したコードを返す
    pub async fn purge_expired(&self) -> Result<Vec<RoomCode>, GameError> {
        bounded(self.config.store_timeout, self.purge_unlocked()).await
    }

    async fn purge_unlocked(&self) -> Result<Vec<RoomCode>, GameError> {
        let purged = self.store.purge_expired().await?;
        for code in &purged {
            tracing::info!("Room '{}' expired", code);
            self.store.publish(RoomEvent::Expired { code: code.clone() });
        }
        let pruned = self.locks.prune_idle().await;
        if pruned > 0 {
            tracing::debug!("Pruned {} idle room lock(s)", pruned);
        }
        Ok(purged)
    }
}
