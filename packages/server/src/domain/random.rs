//! 乱数源の抽象化
//!
//! ルームコード生成、秘密の単語・インポスターの選出に使う。
//! テストでは決定的な実装に差し替える。

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;

/// 一様乱数の供給元
pub trait RandomSource: Send + Sync {
    /// `0..upper` の範囲から一様に 1 つ選ぶ（`upper` は 1 以上）
    fn next_index(&self, upper: usize) -> usize;
}

/// スレッドローカル RNG を使う実装
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_index(&self, upper: usize) -> usize {
        rand::rng().random_range(0..upper.max(1))
    }
}

/// 固定の値を順番に返す実装（テスト用）
///
/// 値は `upper` で剰余を取ってから返す。末尾まで使い切ると先頭に戻る。
#[derive(Debug)]
pub struct SequenceRandom {
    values: Vec<usize>,
    cursor: AtomicUsize,
}

impl SequenceRandom {
    pub fn new(values: Vec<usize>) -> Self {
        Self {
            values,
            cursor: AtomicUsize::new(0),
        }
    }
}

impl RandomSource for SequenceRandom {
    fn next_index(&self, upper: usize) -> usize {
        let upper = upper.max(1);
        if self.values.is_empty() {
            return 0;
        }
        let position = self.cursor.fetch_add(1, Ordering::SeqCst) % self.values.len();
        self.values[position] % upper
    }
}

/// スライスから一様に 1 要素選ぶ
pub fn choose<'a, T>(random: &dyn RandomSource, items: &'a [T]) -> Option<&'a T> {
    if items.is_empty() {
        return None;
    }
    items.get(random.next_index(items.len()))
}
