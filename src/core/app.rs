use anyhow::Result;
use matrix_sdk::ruma::OwnedServerName;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::core::config::Config;
use crate::core::error::AppError;
use crate::matrix::client::MatrixClient;
use crate::reconciler::service::SpaceLeaveReconciler;
use crate::web::routes;

pub struct App {
    config: Config,
    reconciler: Arc<SpaceLeaveReconciler>,
}

impl App {
    pub async fn new(config: Config) -> Result<Self> {
        info!("Initializing application components");

        if !config.module.is_empty() {
            info!("Module settings: {:?}", config.module);
        }

        let server_name = OwnedServerName::try_from(config.matrix.server_name.as_str())
            .map_err(|e| AppError::Config(format!("Invalid server name: {}", e)))?;

        // Initialize Matrix client
        let matrix_client = Arc::new(MatrixClient::new(&config.matrix).await?);
        let admin = matrix_client.admin_identity()?;

        let reconciler = Arc::new(SpaceLeaveReconciler::new(
            matrix_client,
            server_name,
            admin,
            config.reconciler.space_detection,
        ));

        Ok(Self { config, reconciler })
    }

    pub async fn run(self) -> Result<()> {
        let app_state = AppState {
            reconciler: self.reconciler,
            config: self.config.clone(),
        };

        let app = routes::create_router(Arc::new(app_state));

        let host: std::net::IpAddr = self.config.server.host.parse()
            .map_err(|e| AppError::Config(format!("Invalid HOST: {}", e)))?;
        let addr = SocketAddr::from((host, self.config.server.port));
        info!("Listening for transactions on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

#[derive(Clone)]
pub struct AppState {
    pub reconciler: Arc<SpaceLeaveReconciler>,
    pub config: Config,
}
