//! Integration tests for the proxy rule
//!
//! These tests feed recorded-style platform exchanges through the full
//! `ProxyRule` against real SQLite storage and the in-memory link queue.

use chrono::{TimeZone, Utc};
use mp_spider::config::{
    Config, ContentFormat, PageConfig, ProfileConfig, RuleConfig, StorageConfig,
};
use mp_spider::dispatch::SpiderContext;
use mp_spider::output::load_statistics;
use mp_spider::proxy::{InterceptedRequest, ProxyResponse, ProxyRule};
use mp_spider::queue::MemoryQueue;
use mp_spider::storage::{AccountPatch, ArticleKey, SqliteStorage, Storage};
use reqwest::{Method, StatusCode};
use std::sync::Arc;

const HISTORY_URL: &str =
    "https://mp.weixin.qq.com/mp/profile_ext?action=home&__biz=MzI4&scene=124&devicetype=android";

const ARTICLE_URL: &str = "https://mp.weixin.qq.com/s?__biz=MzI4&mid=100&idx=1&sn=a&chksm=1";

/// Creates a test configuration that writes to the given database
fn create_test_config(db_path: &str) -> Config {
    Config {
        storage: StorageConfig {
            database_path: db_path.to_string(),
        },
        rule: RuleConfig {
            replace_post_body: true,
            crawl_comments: true,
            replace_images: false,
            replacement_image: None,
        },
        page: PageConfig {
            disable: false,
            jump_interval: 2,
            jump_random: 0,
            min_time: Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
            max_time: None,
            crawl_existing: false,
            crawl_existing_interval: 24 * 60 * 60,
            target_accounts: vec![],
            save_content: true,
            content_format: ContentFormat::Text,
        },
        profile: ProfileConfig {
            disable: false,
            min_time: Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
            jump_interval: 5,
            revisit_interval: 24 * 60 * 60,
            target_accounts: vec![],
        },
        auth: None,
    }
}

fn spider(storage: Arc<SqliteStorage>, config: Config) -> ProxyRule {
    let context = SpiderContext::new(config, storage, Arc::new(MemoryQueue::new()));
    ProxyRule::new(context).expect("Failed to build proxy rule")
}

fn history_page() -> String {
    let listing = concat!(
        "{&quot;list&quot;:[",
        "{&quot;comm_msg_info&quot;:{&quot;datetime&quot;:1700200000},&quot;app_msg_ext_info&quot;:{",
        "&quot;title&quot;:&quot;Headline&quot;,&quot;digest&quot;:&quot;From the listing&quot;,",
        "&quot;content_url&quot;:&quot;http:\\/\\/mp.weixin.qq.com\\/s?__biz=MzI4&amp;mid=100&amp;idx=1&amp;sn=a#rd&quot;,",
        "&quot;multi_app_msg_item_list&quot;:[{&quot;title&quot;:&quot;Second&quot;,",
        "&quot;content_url&quot;:&quot;http:\\/\\/mp.weixin.qq.com\\/s?__biz=MzI4&amp;mid=100&amp;idx=2&amp;sn=b#rd&quot;}]}},",
        "{&quot;comm_msg_info&quot;:{&quot;datetime&quot;:1600000000},&quot;app_msg_ext_info&quot;:{",
        "&quot;title&quot;:&quot;Too old&quot;,",
        "&quot;content_url&quot;:&quot;http:\\/\\/mp.weixin.qq.com\\/s?__biz=MzI4&amp;mid=50&amp;idx=1&amp;sn=c#rd&quot;}}",
        "]}"
    );

    history_page_with(listing)
}

fn history_page_with(listing: &str) -> String {
    format!(
        "<html><head><title>Daily News</title></head><body>\
         <!--headTrap<body></body><head></head><html></html>-->\
         <div class=\"weui-panel\"></div>\
         <script>\nvar nickname = \"Daily News\" || \"\";\nvar headimg = \"http://wx.qlogo.cn/mmhead/1/0\" || \"\";\nvar msgList = '{}';\n</script>\
         </body></html>",
        listing
    )
}

const ARTICLE_PAGE: &str = r#"<html><head><title>Headline</title></head><body>
<span class="profile_meta_value">daily_news</span>
<div class="rich_media_content " id="js_content">
    <p>First paragraph</p>
</div>
<script nonce="42">
    var msg_title = "Headline";
    var ct = "1700200000";
    var msg_cdn_url = "https://mmbiz.qpic.cn/cover.jpg";
    var msg_desc = "What happened";
</script>
</body></html>"#;

#[tokio::test]
async fn test_history_article_metrics_and_comments() {
    let storage = Arc::new(SqliteStorage::new_in_memory().unwrap());
    let rule = spider(Arc::clone(&storage), create_test_config(":memory:"));

    // History page: account and embedded listing are saved, controller injected
    let request = InterceptedRequest::new(Method::GET, HISTORY_URL);
    let page = rule
        .before_send_response(&request, ProxyResponse::html(StatusCode::OK, history_page()))
        .await
        .unwrap()
        .expect("history page should be rewritten");
    let page = page.text_body();
    assert!(page.contains("<div class=\"weui-panel\"></div>"));
    assert!(page.contains("/ws/profiles/first_post"));
    assert!(!page.contains("headTrap"));

    let account = storage.get_account("MzI4").await.unwrap().unwrap();
    assert_eq!(account.nickname.as_deref(), Some("Daily News"));
    assert!(account.history_opened_at.is_some());

    let record = storage.get_publication_record("MzI4").await.unwrap().unwrap();
    assert_eq!(record.earliest_publish_at, Utc.timestamp_opt(1_600_000_000, 0).unwrap());
    assert_eq!(record.latest_publish_at, Utc.timestamp_opt(1_700_200_000, 0).unwrap());

    // Article page: basic info and body are saved, the page advances
    let request = InterceptedRequest::new(Method::GET, ARTICLE_URL);
    let page = rule
        .before_send_response(&request, ProxyResponse::html(StatusCode::OK, ARTICLE_PAGE))
        .await
        .unwrap()
        .expect("article page should be rewritten");
    let page = page.text_body();
    assert!(page.contains("<title>Headline</title><meta http-equiv=\"refresh\" content=\"2;url="));
    assert!(page.contains("剩余文章抓取长度: "));
    assert!(!page.contains("First paragraph"));

    let key = ArticleKey::new("MzI4", "100", "1");
    let article = storage.get_article(&key).await.unwrap().unwrap();
    assert_eq!(article.title.as_deref(), Some("Headline"));
    assert_eq!(article.account_handle.as_deref(), Some("daily_news"));
    assert_eq!(article.content.as_deref(), Some("First paragraph"));
    // Listed fields stay; the page only adds what the listing lacked
    assert_eq!(article.digest.as_deref(), Some("From the listing"));

    // Read metrics: counters and one sample
    let request = InterceptedRequest::new(
        Method::POST,
        "https://mp.weixin.qq.com/mp/getappmsgext?f=json&mock=&uin=777",
    )
    .with_body("__biz=MzI4&mid=100&idx=1&sn=a&is_need_ad=0");
    let response = ProxyResponse::json(
        StatusCode::OK,
        r#"{"appmsgstat":{"show":true,"read_num":1024,"like_num":16}}"#,
    );
    assert!(rule
        .before_send_response(&request, response)
        .await
        .unwrap()
        .is_none());

    let article = storage.get_article(&key).await.unwrap().unwrap();
    assert_eq!(article.read_count, Some(1024));
    assert_eq!(article.like_count, Some(16));
    assert_eq!(storage.metric_samples(article.id).await.unwrap().len(), 1);

    // Comments: attached to the article
    let request = InterceptedRequest::new(
        Method::GET,
        "https://mp.weixin.qq.com/mp/appmsg_comment?action=getcomment&__biz=MzI4&appmsgid=100&idx=1&comment_id=9&offset=0&limit=100",
    );
    let response = ProxyResponse::json(
        StatusCode::OK,
        r#"{"base_resp":{"ret":0},"elected_comment":[{"content_id":"7001","nick_name":"reader","content":"Nice","create_time":1700200300,"like_num":2,
            "reply":{"reply_list":[{"content":"Thanks","create_time":1700200400,"reply_like_num":1},{"content":"Agreed","create_time":1700200500}]}}]}"#,
    );
    rule.before_send_response(&request, response).await.unwrap();

    let comment = storage.get_comment("7001").await.unwrap().unwrap();
    assert_eq!(comment.article_id, article.id);
    assert_eq!(comment.replies.len(), 2);

    let stats = load_statistics(storage.as_ref()).await.unwrap();
    assert_eq!(stats.total_articles, 3);
    assert_eq!(stats.measured_articles, 1);
    assert_eq!(stats.accounts, 1);
    assert_eq!(stats.comments, 1);
    assert_eq!(stats.metric_samples, 1);
}

/// Cutoff the controller was rendered with, read back from the injected script
fn rendered_cutoff(page: &str) -> chrono::DateTime<Utc> {
    let start = page.find("var CUTOFF_MS = ").expect("controller script") + "var CUTOFF_MS = ".len();
    let end = start + page[start..].find(';').expect("cutoff statement");
    let millis: i64 = page[start..end].trim().parse().expect("cutoff millis");
    Utc.timestamp_millis_opt(millis).unwrap()
}

#[tokio::test]
async fn test_revisit_with_many_new_posts_walks_back_to_previous_latest() {
    let storage = Arc::new(SqliteStorage::new_in_memory().unwrap());
    let mut config = create_test_config(":memory:");
    config.profile.min_time = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let rule = spider(Arc::clone(&storage), config);

    // An earlier walk covered everything down to min-time
    let previous_earliest = Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap();
    let previous_latest = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    storage
        .record_publications("MzI4", previous_earliest, previous_latest)
        .await
        .unwrap();

    // Ten newer pushes fill the whole first page, far above the stored span
    let items: Vec<String> = (22..=31)
        .rev()
        .map(|day| {
            let datetime = Utc.with_ymd_and_hms(2024, 5, day, 0, 0, 0).unwrap().timestamp();
            format!(
                "{{&quot;comm_msg_info&quot;:{{&quot;datetime&quot;:{}}},&quot;app_msg_ext_info&quot;:{{\
                 &quot;title&quot;:&quot;Post {}&quot;,\
                 &quot;content_url&quot;:&quot;http:\\/\\/mp.weixin.qq.com\\/s?__biz=MzI4&amp;mid={}&amp;idx=1&amp;sn=x#rd&quot;}}}}",
                datetime,
                day,
                500 + day
            )
        })
        .collect();
    let listing = format!("{{&quot;list&quot;:[{}]}}", items.join(","));

    let request = InterceptedRequest::new(Method::GET, HISTORY_URL);
    let page = rule
        .before_send_response(&request, ProxyResponse::html(StatusCode::OK, history_page_with(&listing)))
        .await
        .unwrap()
        .expect("history page should be rewritten");

    let cutoff = rendered_cutoff(&page.text_body());
    assert!(
        cutoff <= previous_latest - chrono::Duration::hours(24),
        "cutoff {} skips pushes after {}",
        cutoff,
        previous_latest
    );

    // The listed posts are saved, but the span waits for the walk to reach it
    assert_eq!(load_statistics(storage.as_ref()).await.unwrap().total_articles, 10);
    let record = storage.get_publication_record("MzI4").await.unwrap().unwrap();
    assert_eq!(record.earliest_publish_at, previous_earliest);
    assert_eq!(record.latest_publish_at, previous_latest);
}

#[tokio::test]
async fn test_control_endpoints_drive_the_account_walk() {
    let storage = Arc::new(SqliteStorage::new_in_memory().unwrap());
    let rule = spider(Arc::clone(&storage), create_test_config(":memory:"));

    storage
        .upsert_account("MzA1", &AccountPatch::default())
        .await
        .unwrap();
    storage
        .upsert_account(
            "MzI4",
            &AccountPatch {
                history_opened_at: Some(Utc::now()),
                ..AccountPatch::default()
            },
        )
        .await
        .unwrap();

    // Only the account not opened within the revisit interval is handed out
    let request =
        InterceptedRequest::new(Method::GET, "https://mp.weixin.qq.com/wx/profiles/next_link");
    let response = rule.before_send_request(&request).await.unwrap().unwrap();
    assert_eq!(response.status, StatusCode::OK);
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(
        body["data"],
        "https://mp.weixin.qq.com/mp/profile_ext?action=home&__biz=MzA1&scene=124#wechat_redirect"
    );

    // The controller reports the first post of the account it walked
    let request =
        InterceptedRequest::new(Method::POST, "https://mp.weixin.qq.com/ws/profiles/first_post")
            .with_body(format!(
                r#"{{"link":"{}","publishAt":1562083200000}}"#,
                HISTORY_URL
            ));
    let response = rule.before_send_request(&request).await.unwrap().unwrap();
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.text_body(), "ok");

    let account = storage.get_account("MzI4").await.unwrap().unwrap();
    assert_eq!(
        account.first_publish_at,
        Some(Utc.timestamp_millis_opt(1_562_083_200_000).unwrap())
    );

    let request =
        InterceptedRequest::new(Method::POST, "https://mp.weixin.qq.com/ws/profiles/first_post")
            .with_body("{not json");
    let response = rule.before_send_request(&request).await.unwrap().unwrap();
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_removed_article_never_refills() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("spider.db");
    let storage = Arc::new(SqliteStorage::new(&db_path).unwrap());
    let mut config = create_test_config(db_path.to_str().unwrap());
    config.rule.replace_post_body = false;
    let rule = spider(Arc::clone(&storage), config);

    let request = InterceptedRequest::new(Method::GET, ARTICLE_URL);
    let removed = ProxyResponse::html(
        StatusCode::OK,
        r#"<html><head><title>x</title></head><body><div class="global_error_msg warn">This content has been deleted</div></body></html>"#,
    );

    // The removed article is flagged and nothing else is queued
    assert!(rule
        .before_send_response(&request, removed)
        .await
        .unwrap()
        .is_none());

    let article = storage
        .get_article(&ArticleKey::new("MzI4", "100", "1"))
        .await
        .unwrap()
        .unwrap();
    assert!(article.failed);
}

#[tokio::test]
async fn test_unrelated_traffic_passes_untouched() {
    let storage = Arc::new(SqliteStorage::new_in_memory().unwrap());
    let rule = spider(Arc::clone(&storage), create_test_config(":memory:"));

    let request = InterceptedRequest::new(Method::GET, "https://res.wx.qq.com/open/js/jweixin.js");
    assert!(rule.before_send_request(&request).await.unwrap().is_none());
    assert!(rule
        .before_send_response(&request, ProxyResponse::text(StatusCode::OK, "var wx = {};"))
        .await
        .unwrap()
        .is_none());

    let stats = load_statistics(storage.as_ref()).await.unwrap();
    assert_eq!(stats.total_articles, 0);
    assert_eq!(stats.accounts, 0);
}
