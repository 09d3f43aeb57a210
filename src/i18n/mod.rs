//! 多语言错误消息模块
//!
//! 使用rat_embed_lang框架提供统一的错误消息多语言支持

use rat_embed_lang::register_translations;
use std::collections::HashMap;

/// 错误消息翻译注册器
pub struct ErrorMessageI18n;

impl ErrorMessageI18n {
    fn entry(
        translations: &mut HashMap<String, HashMap<String, String>>,
        key: &str,
        zh: &str,
        en: &str,
        ja: &str,
    ) {
        let mut messages = HashMap::new();
        messages.insert("zh-CN".to_string(), zh.to_string());
        messages.insert("en-US".to_string(), en.to_string());
        messages.insert("ja-JP".to_string(), ja.to_string());
        translations.insert(key.to_string(), messages);
    }

    /// 注册所有错误消息翻译
    pub fn register_all_translations() {
        let mut translations = HashMap::new();

        // 连接创建
        Self::entry(
            &mut translations,
            "error.connection_creation",
            "创建数据库连接失败 (引擎={engine}): {message}",
            "Failed to create database connection (engine={engine}): {message}",
            "データベース接続の作成に失敗しました (エンジン={engine}): {message}",
        );

        // 连接已关闭
        Self::entry(
            &mut translations,
            "error.connection_closed",
            "数据库连接已关闭: {engine}",
            "Database connection is closed: {engine}",
            "データベース接続は閉じられています: {engine}",
        );

        // 阻塞任务丢失
        Self::entry(
            &mut translations,
            "error.blocking_task",
            "数据库阻塞任务执行失败: {message}",
            "Database blocking task failed: {message}",
            "データベースのブロッキングタスクが失敗しました: {message}",
        );

        // 嵌套事务
        Self::entry(
            &mut translations,
            "error.nested_transaction",
            "连接 {id} 已处于事务中，不允许嵌套事务",
            "Connection {id} is already inside a transaction; nesting is not allowed",
            "接続 {id} は既にトランザクション中です。ネストは許可されていません",
        );

        // 没有进行中的事务
        Self::entry(
            &mut translations,
            "error.no_transaction",
            "连接 {id} 没有进行中的事务",
            "Connection {id} has no open transaction",
            "接続 {id} に進行中のトランザクションはありません",
        );

        // 配置解析
        Self::entry(
            &mut translations,
            "error.config_parse",
            "配置文件解析失败: {message}",
            "Failed to parse configuration: {message}",
            "設定の解析に失敗しました: {message}",
        );

        // 配置项缺失
        Self::entry(
            &mut translations,
            "error.config_missing_field",
            "配置项 {field} 必须设置",
            "Configuration field {field} must be set",
            "設定項目 {field} は必須です",
        );

        // 最大连接数为零
        Self::entry(
            &mut translations,
            "error.config_max_zero",
            "最大连接数必须大于零",
            "max_connections must be greater than zero",
            "最大接続数はゼロより大きくなければなりません",
        );

        // 最小连接数超过最大连接数
        Self::entry(
            &mut translations,
            "error.config_min_exceeds_max",
            "最小连接数({min})不能大于最大连接数({max})",
            "min_connections ({min}) cannot exceed max_connections ({max})",
            "最小接続数({min})は最大接続数({max})を超えられません",
        );

        // 时间配置为零
        Self::entry(
            &mut translations,
            "error.config_zero_duration",
            "配置项 {field} 不能为零",
            "Configuration field {field} cannot be zero",
            "設定項目 {field} はゼロにできません",
        );

        // 引擎不可用
        Self::entry(
            &mut translations,
            "error.engine_unavailable",
            "数据库引擎 {engine} 不可用（可能需要启用相应的feature）",
            "Database engine {engine} is unavailable (the matching feature may need to be enabled)",
            "データベースエンジン {engine} は利用できません（対応するfeatureを有効にする必要があります）",
        );

        // SQLite数据库文件不存在
        Self::entry(
            &mut translations,
            "error.sqlite_file_not_found",
            "SQLite数据库文件不存在且未启用自动创建: {path}",
            "SQLite database file does not exist and auto-create is not enabled: {path}",
            "SQLiteデータベースファイルが存在せず、自動作成が有効ではありません: {path}",
        );

        // 未知连接归还
        Self::entry(
            &mut translations,
            "warn.release_unknown_handle",
            "归还了连接池中不存在的连接 {id}，已直接关闭",
            "Released connection {id} is not registered in the pool; closing it",
            "プールに登録されていない接続 {id} が返却されました。直接閉じます",
        );

        // 其他连接池的连接
        Self::entry(
            &mut translations,
            "warn.release_foreign_handle",
            "连接 {id} 属于其他连接池，已交还给所属连接池",
            "Connection {id} belongs to another pool; returning it to its owner",
            "接続 {id} は別のプールに属しています。所属プールに返却します",
        );

        // 注册所有翻译
        register_translations(translations);
    }

    /// 初始化错误消息多语言支持
    pub fn init() {
        Self::register_all_translations();

        // 从环境变量获取语言设置，默认为zh-CN
        let lang = std::env::var("RAT_LANG")
            .or_else(|_| std::env::var("LANG"))
            .unwrap_or_else(|_| "zh-CN".to_string());

        // 标准化语言代码
        use rat_embed_lang::normalize_language_code;
        let normalized_lang = normalize_language_code(&lang);
        set_language(&normalized_lang);
    }
}

/// 重新导出rat_embed_lang的核心函数
pub use rat_embed_lang::{current_language, set_language, t, tf};
