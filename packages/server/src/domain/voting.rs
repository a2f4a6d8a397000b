//! 投票の集計と勝敗判定

use std::collections::BTreeMap;

use serde::Serialize;

use super::{PlayerId, VoteMap};

/// 勝者
///
/// 同票（最多得票者が 1 人に決まらない）の場合はインポスターの勝ちとする。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Winner {
    /// インポスター以外のプレイヤー全員
    Players,
    Impostor,
}

/// 投票結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingResults {
    /// 得票数（得票 0 の候補は含まない）
    pub tally: BTreeMap<PlayerId, u32>,
    pub most_voted: Option<PlayerId>,
    pub is_tie: bool,
    pub impostor_id: PlayerId,
    pub winner: Winner,
}

/// 投票先ごとの得票数
pub fn tally(votes: &VoteMap) -> BTreeMap<PlayerId, u32> {
    votes
        .values()
        .fold(BTreeMap::new(), |mut counts, target| {
            *counts.entry(target.clone()).or_insert(0) += 1;
            counts
        })
}

/// 最多得票者を決め、勝者を判定する
///
/// 厳密に最多の候補が 1 人だけのときに限り `most_voted` が決まる。
/// 最多で並んだ場合と票が 1 つも無い場合は `is_tie = true`。
pub fn resolve(votes: &VoteMap, impostor_id: &PlayerId) -> VotingResults {
    let tally = tally(votes);
    let max = tally.values().copied().max().unwrap_or(0);
    let mut leaders = tally.iter().filter(|(_, count)| **count == max);

    let most_voted = match (leaders.next(), leaders.next()) {
        (Some((leader, _)), None) if max > 0 => Some(leader.clone()),
        _ => None,
    };
    let is_tie = most_voted.is_none();

    let winner = match &most_voted {
        Some(target) if target == impostor_id => Winner::Players,
        _ => Winner::Impostor,
    };

    VotingResults {
        tally,
        most_voted,
        is_tie,
        impostor_id: impostor_id.clone(),
        winner,
    }
}

/// 手番順に残っている投票者の票だけを残す
///
/// 途中で抜けたプレイヤーの票は集計に含めない。
pub fn cast_by(votes: &VoteMap, turn_order: &[PlayerId]) -> VoteMap {
    votes
        .iter()
        .filter(|(voter, _)| turn_order.contains(voter))
        .map(|(voter, target)| (voter.clone(), target.clone()))
        .collect()
}

/// 手番順の全員が投票済みかどうか
pub fn all_voted(turn_order: &[PlayerId], votes: &VoteMap) -> bool {
    !turn_order.is_empty() && turn_order.iter().all(|id| votes.contains_key(id))
}
