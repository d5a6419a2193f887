use std::path::Path;

use rotator_serve::ServeConfig;
use rotator_session::{EventLoop, Session};

use crate::context::Context;

pub fn execute(repo_root: &Path, bind: &str, port: u16) -> anyhow::Result<()> {
    let ctx = Context::load(repo_root)?;
    let settings = ctx.settings()?;
    let gateway = ctx.gateway()?;
    let config = ServeConfig {
        bind: bind.to_string(),
        port,
        config_path: Some(ctx.paths.config_json.clone()),
    };
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let handle = EventLoop::spawn(Session::new(settings), gateway);
        rotator_serve::serve(handle, config).await
    })
}
