#![allow(dead_code)]

pub mod recording {
    use bodispatch::logging::ErrorLog;
    use bodispatch::RequestId;
    use std::sync::Mutex;

    /// One technical error handed to the logger.
    #[derive(Debug, Clone)]
    pub struct LoggedError {
        pub request_id: RequestId,
        pub message: String,
        pub trace: String,
    }

    /// Error log that keeps every entry for later assertions.
    #[derive(Debug, Default)]
    pub struct RecordingLog {
        entries: Mutex<Vec<LoggedError>>,
    }

    impl RecordingLog {
        pub fn entries(&self) -> Vec<LoggedError> {
            self.entries.lock().unwrap().clone()
        }
    }

    impl ErrorLog for RecordingLog {
        fn log(&self, request_id: RequestId, message: &str, trace: &str) {
            self.entries.lock().unwrap().push(LoggedError {
                request_id,
                message: message.to_string(),
                trace: trace.to_string(),
            });
        }
    }
}

pub mod objects {
    use bodispatch::datasource::MemoryConnection;
    use bodispatch::dispatcher::StepOutput;
    use bodispatch::handler::{ActionTable, BusinessObject, Exchange, HandlerError};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    type Out = Result<StepOutput, HandlerError>;

    /// Answers `GET /faq/` by convention.
    #[derive(Default)]
    pub struct Faq;

    impl Faq {
        fn index_get(&mut self, ex: &mut Exchange, _: &[Value]) -> Out {
            ex.set_payload(json!({ "questions": ["Why?", "How?"] }));
            Ok(StepOutput::done())
        }

        fn show_get(&mut self, ex: &mut Exchange, _: &[Value]) -> Out {
            let id = ex.param_str("id").unwrap_or("none").to_string();
            ex.set_payload(json!({ "id": id }));
            Ok(StepOutput::done())
        }
    }

    impl BusinessObject for Faq {
        fn actions(table: &mut ActionTable<Self>) {
            table.on("indexGet", Self::index_get).on("showGet", Self::show_get);
        }
    }

    /// Aspect-plan object; every executed step is appended to `trail`.
    pub struct User {
        pub trail: Arc<Mutex<Vec<String>>>,
    }

    impl User {
        fn mark(&self, step: &str) {
            self.trail.lock().unwrap().push(step.to_string());
        }

        fn validate(&mut self, ex: &mut Exchange, _: &[Value]) -> Out {
            self.mark("validate");
            ex.check_parameters()?;
            Ok(StepOutput::next(json!(true)))
        }

        fn save(&mut self, ex: &mut Exchange, args: &[Value]) -> Out {
            self.mark("save");
            let name = ex.param_str("name").unwrap_or_default().to_string();
            ex.data_source::<MemoryConnection>("main")?
                .put("user", json!(name));
            ex.set_status(201);
            ex.set_payload(json!({ "saved": name, "mode": args.first().cloned().unwrap_or(Value::Null) }));
            Ok(StepOutput::stop(json!("saved")))
        }

        fn notify(&mut self, _: &mut Exchange, _: &[Value]) -> Out {
            self.mark("notify");
            Ok(StepOutput::next(Value::Null))
        }

        fn register_post(&mut self, ex: &mut Exchange, _: &[Value]) -> Out {
            self.mark("registerPost");
            ex.check_parameters()?;
            let email = ex.param_str("email").unwrap_or_default().to_string();
            ex.set_payload(json!({ "registered": email }));
            Ok(StepOutput::done())
        }
    }

    impl BusinessObject for User {
        fn actions(table: &mut ActionTable<Self>) {
            table
                .on("validate", Self::validate)
                .on("save", Self::save)
                .on("notify", Self::notify)
                .on("registerPost", Self::register_post);
        }
    }

    /// Writes to the `main` and `audit` data sources.
    #[derive(Default)]
    pub struct Ledger;

    impl Ledger {
        fn transfer_post(&mut self, ex: &mut Exchange, _: &[Value]) -> Out {
            ex.data_source::<MemoryConnection>("main")?
                .put("balance", json!(90));
            ex.data_source::<MemoryConnection>("audit")?
                .put("entry", json!("transfer 10"));
            ex.set_payload(json!({ "ok": true }));
            Ok(StepOutput::done())
        }

        fn crash_post(&mut self, ex: &mut Exchange, _: &[Value]) -> Out {
            ex.data_source::<MemoryConnection>("main")?
                .put("balance", json!(0));
            Err(HandlerError::technical("ledger out of balance"))
        }

        fn locked_post(&mut self, ex: &mut Exchange, _: &[Value]) -> Out {
            ex.set_status(503);
            Err(HandlerError::technical("ledger locked"))
        }

        fn denied_get(&mut self, _: &mut Exchange, _: &[Value]) -> Out {
            Err(HandlerError::forbidden("not your ledger"))
        }

        fn panic_get(&mut self, _: &mut Exchange, _: &[Value]) -> Out {
            panic!("ledger index corrupted");
        }
    }

    impl BusinessObject for Ledger {
        fn actions(table: &mut ActionTable<Self>) {
            table
                .on("transferPost", Self::transfer_post)
                .on("crashPost", Self::crash_post)
                .on("lockedPost", Self::locked_post)
                .on("deniedGet", Self::denied_get)
                .on("panicGet", Self::panic_get);
        }
    }
}

pub mod app {
    use super::objects::{Faq, Ledger, User};
    use super::recording::RecordingLog;
    use bodispatch::aop::{AopPlan, AopStep, MemoryAopLoader};
    use bodispatch::config::{AppConfig, DataSourceConfig};
    use bodispatch::datasource::MemoryConnector;
    use bodispatch::form::{Constraint, FieldRule, FieldSchema, MemoryFormLoader};
    use bodispatch::handler::HandlerRegistry;
    use bodispatch::logging::ErrorLog;
    use bodispatch::routes::HandlerId;
    use bodispatch::service::{AppService, AppServiceBuilder};
    use http::Method;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    /// A service over the sample objects, plus handles for inspecting what happened.
    pub struct TestApp {
        pub service: AppService,
        pub log: Arc<RecordingLog>,
        pub store: MemoryConnector,
        pub trail: Arc<Mutex<Vec<String>>>,
    }

    pub fn register_form() -> FieldSchema {
        let mut email = FieldRule::new("email");
        email.label = Some("E-mail".into());
        email.required = Some(Constraint::new(true).with_message("E-mail is required"));
        email.format = Some(Constraint::new("email".to_string()));
        FieldSchema::new(vec![email])
    }

    pub fn build(config: AppConfig) -> TestApp {
        let log = Arc::new(RecordingLog::default());
        let store = MemoryConnector::new();
        let trail = Arc::new(Mutex::new(Vec::new()));

        let mut handlers = HandlerRegistry::new();
        handlers.register_default::<Faq>(HandlerId::new("/", "Faq"));
        handlers.register_default::<Ledger>(HandlerId::new("/", "Ledger"));
        let user_trail = Arc::clone(&trail);
        handlers.register(HandlerId::new("/", "User"), move || User {
            trail: Arc::clone(&user_trail),
        });

        let plans = MemoryAopLoader::new().with(
            "/user/create",
            &Method::POST,
            AopPlan::new(vec![
                AopStep::new("validate"),
                AopStep::new("save").with_arguments(vec![json!("draft")]),
                AopStep::new("notify"),
            ]),
        );
        let forms = MemoryFormLoader::new().with("/user/register", &Method::POST, register_form());

        let service = AppServiceBuilder::new(config)
            .handlers(handlers)
            .connector(MemoryConnector::KIND, Arc::new(store.clone()))
            .aop_loader(Arc::new(plans))
            .form_loader(Arc::new(forms))
            .error_log(Arc::clone(&log) as Arc<dyn ErrorLog>)
            .build()
            .unwrap();

        TestApp {
            service,
            log,
            store,
            trail,
        }
    }

    /// Configuration with memory-backed `main` and `audit` sources.
    pub fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config
            .data_sources
            .insert("main".into(), DataSourceConfig::new(MemoryConnector::KIND));
        config
            .data_sources
            .insert("audit".into(), DataSourceConfig::new(MemoryConnector::KIND));
        config
    }
}

pub mod fixtures {
    use std::path::{Path, PathBuf};

    /// Write `content` to `dir/relative`, creating parent directories.
    pub fn write(dir: &Path, relative: &str, content: &str) -> PathBuf {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    pub const ROUTES: &str = r#"
routes:
  - { method: GET, path: /about, handler: { name: Faq, action: index }, uri: "/faq/index?lang=en" }
  - { method: GET, path: /old-faq, redirect: /faq/ }
  - { method: GET, path: /loop-a, redirect: /loop-b }
  - { method: GET, path: /loop-b, redirect: /loop-a }
  - { method: GET, path: /faq, parameters: [id], handler: { name: Faq, action: show }, uri: /faq/show }
  - { method: GET, path: /faq/special, handler: { name: Faq, action: index } }
"#;
}
