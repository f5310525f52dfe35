//! Built-in syllabus content and reference exam constants.
//!
//! These defaults make the trainer usable without any TOML config. Each entry
//! can be overridden through `[[chapters]]` and `[exam]` in the config file.

use std::collections::BTreeMap;

use crate::config::ChapterCfg;

pub const PRACTICE_QUESTION_COUNT: usize = 10;
pub const SIMILAR_SAMPLE_SIZE: usize = 5;
pub const MOCK_EXAM_TIME_LIMIT_SECS: u32 = 60 * 60;
/// 70% of the 60-question mock exam.
pub const PASSING_SCORE: usize = 42;

/// Questions per chapter in the full mock exam (sums to 60).
pub fn mock_distribution() -> BTreeMap<u32, usize> {
  BTreeMap::from([(1, 13), (2, 17), (3, 10), (4, 11), (5, 9)])
}

/// The five chapters of the Generative AI Passport syllabus.
pub fn default_chapters() -> Vec<ChapterCfg> {
  vec![
    ChapterCfg {
      number: 1,
      title: "第1章 AI（人工知能）".into(),
      syllabus: "AIの定義、歴史（第一次〜第三次ブーム）、機械学習（教師あり・教師なし・強化学習）、ディープラーニングの仕組み、ニューラルネットワーク、統計学とAIの違い、チューリングテスト、ダートマス会議など。".into(),
    },
    ChapterCfg {
      number: 2,
      title: "第2章 生成AI（ジェネレーティブAI）".into(),
      syllabus: "生成AIの仕組み（Transformerのアーキテクチャ、Attentionメカニズム）、GAN（敵対的生成ネットワーク）、VAE、拡散モデル（Diffusion Models）、大規模言語モデル（LLM）の基礎、トークナイズの仕組み。".into(),
    },
    ChapterCfg {
      number: 3,
      title: "第3章 現在の生成AI（ジェネレーティブAI）の動向".into(),
      syllabus: "主要なLLM（ChatGPT, Gemini, Claude, Llama）、画像生成AI（Stable Diffusion, Midjourney, DALL-E）、マルチモーダルAI、動画生成AI、音声合成技術、ビジネスにおける最新の活用事例とツールの特徴。".into(),
    },
    ChapterCfg {
      number: 4,
      title: "第4章 情報リテラシー・基本理念とAI社会原則".into(),
      syllabus: "ハルシネーション（幻覚）、機密情報の漏洩リスク、バイアスと公平性、AI倫理（人間中心のAI社会原則）、著作権法（第30条の4等）、個人情報保護法、国内外のAIガイドライン（総務省・経済産業省、EU AI法）、ディープフェイクのリスク。".into(),
    },
    ChapterCfg {
      number: 5,
      title: "第5章 テキスト生成AIのプロンプト制作と実例".into(),
      syllabus: "プロンプトエンジニアリングの基本原則、Few-shotプロンプティング、Chain of Thought (CoT)、ReAct、ゼロショット、具体的な業務効率化（要約、翻訳、コード生成）のプロンプト実例、出力結果の検証とファクトチェックの方法。".into(),
    },
  ]
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mock_distribution_covers_every_chapter_and_sums_to_sixty() {
    let dist = mock_distribution();
    assert_eq!(dist.values().sum::<usize>(), 60);
    let numbers: Vec<u32> = default_chapters().iter().map(|c| c.number).collect();
    assert_eq!(dist.keys().copied().collect::<Vec<_>>(), numbers);
  }
}
