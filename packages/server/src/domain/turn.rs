//! 手番の巡回
//!
//! 手番順はゲーム開始時のメンバー順のスナップショット（`GameState::turn_order`）。
//! 途中参加者は次のゲームまで観戦となり、退出者は手番順から取り除かれる。

use super::{GameState, PlayerId};

/// 範囲外のインデックスを 0 に戻す
pub fn heal_index(index: usize, len: usize) -> usize {
    if index >= len { 0 } else { index }
}

/// 次のインデックスと、一周して 0 に戻ったかどうか
pub fn advance_index(index: usize, len: usize) -> (usize, bool) {
    if len == 0 {
        return (0, false);
    }
    let next = (index + 1) % len;
    (next, next == 0)
}

/// ヒント提出の手番にあたるプレイヤー
///
/// インデックスが範囲外なら 0 に補正してから返す。
pub fn current_player(state: &mut GameState) -> Option<PlayerId> {
    state.current_player_index = heal_index(state.current_player_index, state.turn_order.len());
    state.turn_order.get(state.current_player_index).cloned()
}

/// 投票の手番にあたるプレイヤー
pub fn current_voter(state: &mut GameState) -> Option<PlayerId> {
    state.current_voter_index = heal_index(state.current_voter_index, state.turn_order.len());
    state.turn_order.get(state.current_voter_index).cloned()
}

/// ヒント提出の手番を進める。一周したら `current_turn` を加算する。
pub fn advance_player(state: &mut GameState) {
    let (next, wrapped) = advance_index(state.current_player_index, state.turn_order.len());
    state.current_player_index = next;
    if wrapped {
        state.current_turn += 1;
    }
}

/// 投票の手番を進める
pub fn advance_voter(state: &mut GameState) {
    let (next, _) = advance_index(state.current_voter_index, state.turn_order.len());
    state.current_voter_index = next;
}

/// 退出したプレイヤーを手番順から取り除き、インデックスを補正する
///
/// 取り除かれたプレイヤーより後ろを指していたインデックスは 1 つ前にずらし、
/// 同じ相手を指し続けるようにする。
pub fn remove_from_turn_order(state: &mut GameState, player_id: &PlayerId) -> bool {
    let Some(position) = state.turn_order.iter().position(|id| id == player_id) else {
        return false;
    };
    state.turn_order.remove(position);

    let len = state.turn_order.len();
    state.current_player_index = shift_after_removal(state.current_player_index, position, len);
    state.current_voter_index = shift_after_removal(state.current_voter_index, position, len);
    true
}

fn shift_after_removal(index: usize, removed: usize, len: usize) -> usize {
    let shifted = if index > removed { index - 1 } else { index };
    heal_index(shifted, len)
}
