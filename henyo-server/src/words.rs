//! 谜底词库
//!
//! 对局通过 [`WordProvider`] 取词；默认实现是内存中的 [`WordBank`]，
//! 可以从 JSON 文件加载，未配置文件时使用内置词表。

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use protocol::Language;

/// 取词接口
///
/// 取不到词（无匹配、来源不可用）一律返回 `None`，不视为错误。
#[async_trait]
pub trait WordProvider: Send + Sync {
    async fn fetch_random_word(&self, languages: &[Language]) -> Option<String>;
}

/// 词语分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Person,
    Place,
    Object,
    Nature,
    Food,
    Action,
}

/// 词表中的一条
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessWord {
    pub word: String,
    pub category: Category,
    pub language: Language,
}

impl GuessWord {
    pub fn new(word: impl Into<String>, category: Category, language: Language) -> Self {
        Self {
            word: word.into(),
            category,
            language,
        }
    }

    /// 空白词和分隔行不算有效词条
    fn is_playable(&self) -> bool {
        let word = self.word.trim();
        !word.is_empty() && !word.chars().all(|c| c == '-')
    }
}

/// 内存词库
#[derive(Debug, Clone, Default)]
pub struct WordBank {
    words: Vec<GuessWord>,
}

impl WordBank {
    /// 由词条创建（过滤无效词条）
    pub fn new(words: impl IntoIterator<Item = GuessWord>) -> Self {
        let words = words
            .into_iter()
            .filter(GuessWord::is_playable)
            .map(|mut w| {
                w.word = w.word.trim().to_string();
                w
            })
            .collect();
        Self { words }
    }

    /// 从 JSON 文件加载
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("读取词库失败: {:?}", path))?;
        let entries: Vec<GuessWord> = serde_json::from_str(&content)
            .with_context(|| format!("解析词库失败: {:?}", path))?;

        let total = entries.len();
        let bank = Self::new(entries);
        info!("词库已加载: {:?} ({} 条，跳过 {} 条)", path, bank.len(), total - bank.len());
        Ok(bank)
    }

    /// 内置词表
    pub fn builtin() -> Self {
        use Category::*;
        use Language::*;

        let entries: &[(&str, Category, Language)] = &[
            ("Teacher", Person, English),
            ("Firefighter", Person, English),
            ("Astronaut", Person, English),
            ("Beach", Place, English),
            ("Library", Place, English),
            ("Airport", Place, English),
            ("Umbrella", Object, English),
            ("Guitar", Object, English),
            ("Scissors", Object, English),
            ("Volcano", Nature, English),
            ("Rainbow", Nature, English),
            ("Coconut", Food, English),
            ("Pancake", Food, English),
            ("Swimming", Action, English),
            ("Dancing", Action, English),
            ("Guro", Person, Tagalog),
            ("Magsasaka", Person, Tagalog),
            ("Palengke", Place, Tagalog),
            ("Simbahan", Place, Tagalog),
            ("Payong", Object, Tagalog),
            ("Walis", Object, Tagalog),
            ("Bulkan", Nature, Tagalog),
            ("Bahaghari", Nature, Tagalog),
            ("Adobo", Food, Tagalog),
            ("Sinigang", Food, Tagalog),
            ("Halo-halo", Food, Tagalog),
            ("Tumakbo", Action, Tagalog),
            ("Sumayaw", Action, Tagalog),
        ];

        Self::new(
            entries
                .iter()
                .map(|(word, category, language)| GuessWord::new(*word, *category, *language)),
        )
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// 从指定语言中随机取一个词
    pub fn pick(&self, languages: &[Language]) -> Option<&GuessWord> {
        let candidates: Vec<&GuessWord> = self
            .words
            .iter()
            .filter(|w| languages.contains(&w.language))
            .collect();
        candidates.choose(&mut rand::thread_rng()).copied()
    }
}

#[async_trait]
impl WordProvider for WordBank {
    async fn fetch_random_word(&self, languages: &[Language]) -> Option<String> {
        let word = self.pick(languages).map(|w| w.word.clone());
        if word.is_none() {
            debug!("没有可用的谜底: {:?}", languages);
        }
        word
    }
}

/// 按顺序返回预设结果的取词器
#[cfg(test)]
pub(crate) struct ScriptedWords {
    script: std::sync::Mutex<std::collections::VecDeque<Option<String>>>,
}

#[cfg(test)]
impl ScriptedWords {
    pub(crate) fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        Self {
            script: std::sync::Mutex::new(words.into_iter().map(|w| w.map(Into::into)).collect()),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl WordProvider for ScriptedWords {
    async fn fetch_random_word(&self, _languages: &[Language]) -> Option<String> {
        self.script.lock().unwrap().pop_front().flatten()
    }
}
