//! 秘密の単語の語彙

use super::{RandomSource, random::choose};

/// ゲームで使う単語の一覧
pub const SECRET_WORDS: &[&str] = &[
    "playa",
    "montaña",
    "hospital",
    "escuela",
    "aeropuerto",
    "biblioteca",
    "restaurante",
    "cine",
    "museo",
    "estadio",
    "supermercado",
    "circo",
    "castillo",
    "barco",
    "tren",
    "avión",
    "granja",
    "zoológico",
    "gimnasio",
    "panadería",
    "farmacia",
    "iglesia",
    "desierto",
    "selva",
    "volcán",
    "isla",
    "piscina",
    "parque",
    "oficina",
    "teatro",
    "guitarra",
    "pizza",
    "elefante",
    "astronauta",
    "dinosaurio",
    "chocolate",
    "paraguas",
    "bicicleta",
    "fantasma",
    "pirata",
];

/// 語彙から一様に 1 語選ぶ
pub fn pick_secret_word(random: &dyn RandomSource) -> &'static str {
    choose(random, SECRET_WORDS).copied().unwrap_or("playa")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SequenceRandom;

    #[test]
    fn test_pick_secret_word_uses_random_index() {
        // テスト項目: 乱数のインデックスに対応する単語が選ばれる
        // given (前提条件):
        let random = SequenceRandom::new(vec![2]);

        // when (操作):
        let word = pick_secret_word(&random);

        // then (期待する結果):
        assert_eq!(word, "hospital");
    }

    #[test]
    fn test_vocabulary_has_no_duplicates() {
        // テスト項目: 語彙に重複が無い
        // given (前提条件):
        let mut words: Vec<&str> = SECRET_WORDS.to_vec();

        // when (操作):
        words.sort_unstable();
        words.dedup();

        // then (期待する結果):
        assert_eq!(words.len(), SECRET_WORDS.len());
    }
}
