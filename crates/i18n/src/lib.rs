use std::collections::BTreeMap;

use core_types::UiLanguage;

/// Terminal strings. Missing keys fall back to the other language, then to the key itself.
#[derive(Debug, Clone)]
pub struct I18n {
    lang: UiLanguage,
    zh_cn: BTreeMap<&'static str, &'static str>,
    en_us: BTreeMap<&'static str, &'static str>,
}

impl I18n {
    pub fn new(lang: UiLanguage) -> Self {
        Self {
            lang,
            zh_cn: zh_cn_map(),
            en_us: en_us_map(),
        }
    }

    pub fn set_language(&mut self, lang: UiLanguage) {
        self.lang = lang;
    }

    pub fn language(&self) -> UiLanguage {
        self.lang
    }

    pub fn t<'a>(&'a self, key: &'a str) -> &'a str {
        let (primary, secondary) = match self.lang {
            UiLanguage::ZhCn => (&self.zh_cn, &self.en_us),
            UiLanguage::EnUs => (&self.en_us, &self.zh_cn),
        };
        primary
            .get(key)
            .or_else(|| secondary.get(key))
            .copied()
            .unwrap_or(key)
    }
}

fn zh_cn_map() -> BTreeMap<&'static str, &'static str> {
    BTreeMap::from([
        (
            "chat.welcome",
            "DocMind 工作区已就绪。检索引擎可以处理你的文档，上传文件即可开始索引。",
        ),
        ("chat.busy", "上一条回复仍在生成，请稍候。"),
        ("chat.empty", "请输入问题。"),
        ("chat.unavailable", "检索/生成服务暂时不可用，请稍后重试。"),
        ("chat.cancelled", "已停止生成，保留已收到的内容。"),
        ("docs.title", "已索引文档"),
        ("docs.none", "尚未索引任何文档。"),
        ("docs.added", "已索引"),
        ("docs.failed", "无法读取"),
        ("docs.removed", "已移除"),
        ("docs.not_found", "未找到文档"),
        ("app.unknown_command", "未知命令，输入 /help 查看帮助。"),
        ("app.no_api_key", "未配置 API 密钥"),
    ])
}

fn en_us_map() -> BTreeMap<&'static str, &'static str> {
    BTreeMap::from([
        (
            "chat.welcome",
            "DocMind Workspace Online. My internal RAG logic is ready to process your documents. Upload your data to begin semantic indexing.",
        ),
        ("chat.busy", "A reply is still streaming, please wait."),
        ("chat.empty", "Type a question first."),
        (
            "chat.unavailable",
            "RAG Retrieval Failed. The indexing service might be overloaded.",
        ),
        ("chat.cancelled", "Generation stopped; partial reply kept."),
        ("docs.title", "Indexed documents"),
        ("docs.none", "No documents indexed yet."),
        ("docs.added", "Indexed"),
        ("docs.failed", "Could not read"),
        ("docs.removed", "Removed"),
        ("docs.not_found", "No such document"),
        ("app.unknown_command", "Unknown command, type /help."),
        ("app.no_api_key", "No API key configured"),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_chinese_translation() {
        let i18n = I18n::new(UiLanguage::ZhCn);
        assert_eq!(i18n.t("docs.removed"), "已移除");
    }

    #[test]
    fn switching_language_changes_lookup() {
        let mut i18n = I18n::new(UiLanguage::ZhCn);
        i18n.set_language(UiLanguage::EnUs);
        assert_eq!(i18n.language(), UiLanguage::EnUs);
        assert_eq!(i18n.t("docs.removed"), "Removed");
    }

    #[test]
    fn falls_back_to_key_when_missing() {
        let i18n = I18n::new(UiLanguage::EnUs);
        assert_eq!(i18n.t("not.exists"), "not.exists");
    }

    #[test]
    fn both_catalogs_have_the_same_keys() {
        let zh: Vec<_> = zh_cn_map().into_keys().collect();
        let en: Vec<_> = en_us_map().into_keys().collect();
        assert_eq!(zh, en);
    }
}
