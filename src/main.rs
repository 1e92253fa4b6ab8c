mod api;
mod auth;
mod classifier;
mod config;
mod db;
mod error;
mod logger;
mod models;
mod policy;
mod state;
mod store;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::{middleware, web, App, HttpServer};
use dotenv::dotenv;
use log::{error, info, warn};
use sqlx::postgres::PgPoolOptions;
use std::io;
use std::sync::Arc;

use auth::{LoginAttemptGuard, TokenService};
use classifier::{Classifier, DisabledClassifier, HttpClassifier, KeywordClassifier};
use config::{AppConfig, ClassifierMode, StoreBackend};
use state::AppState;
use store::{MemoryStore, PostgresStore, RecordStore};

fn other_error(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::Other, msg)
}

async fn open_store(config: &AppConfig) -> io::Result<Arc<dyn RecordStore>> {
    match (config.store_backend, config.database_url.as_deref()) {
        (StoreBackend::Postgres, Some(db_url)) => {
            // 连接数据库
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(db_url)
                .await
                .map_err(|e| other_error(format!("数据库连接错误: {}", e)))?;

            // 初始化数据库
            db::initialize_db(pool.clone())
                .await
                .map_err(|e| other_error(format!("数据库初始化错误: {}", e)))?;

            Ok(Arc::new(PostgresStore::new(pool)))
        }
        (StoreBackend::Postgres, None) => Err(other_error("DATABASE_URL must be set".to_string())),
        (StoreBackend::Memory, _) => {
            warn!("使用内存存储，重启后数据会丢失");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

fn build_classifier(config: &AppConfig) -> io::Result<Arc<dyn Classifier>> {
    let classifier: Arc<dyn Classifier> = match config.classifier_mode {
        ClassifierMode::Http => Arc::new(
            HttpClassifier::new(&config.classifier_url, config.classifier_timeout)
                .map_err(|e| other_error(format!("分类服务客户端创建失败: {}", e)))?,
        ),
        ClassifierMode::Keyword => Arc::new(KeywordClassifier),
        ClassifierMode::Off => Arc::new(DisabledClassifier),
    };
    info!("问题分类模式: {:?}", config.classifier_mode);
    Ok(classifier)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // 加载 .env
    dotenv().ok();

    let config = AppConfig::from_env().map_err(|e| other_error(format!("配置错误: {}", e)))?;

    // 初始化日志系统
    if let Err(e) = logger::Logger::init(&config.log_dir, config.log_level) {
        eprintln!("初始化日志系统失败: {}", e);
    }

    info!("应用程序启动");

    let store = open_store(&config).await?;
    let classifier = build_classifier(&config)?;
    let tokens = Arc::new(TokenService::new(config.jwt_secret.as_bytes()));

    let app_state = web::Data::new(AppState::new(
        store,
        LoginAttemptGuard::new(config.guard),
        tokens.clone(),
        classifier,
        config.classifier_timeout,
    ));

    let static_dir = config.static_dir.clone();
    if let Some(dir) = &static_dir {
        if !dir.is_dir() {
            error!("静态文件目录不存在: {}", dir.display());
        }
    }

    info!("服务器启动在 http://{}:{}", config.bind_addr, config.port);

    HttpServer::new(move || {
        let tokens = tokens.clone();
        let mut app = App::new()
            .app_data(app_state.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(middleware::Logger::default())
            .configure(move |cfg| api::configure(cfg, tokens));
        if let Some(dir) = &static_dir {
            app = app.service(Files::new("/", dir).index_file("index.html"));
        }
        app
    })
    .bind((config.bind_addr.as_str(), config.port))?
    .run()
    .await
}
