use super::{
    constants::{collection, field},
    debug, info, AuthProvider, CloudClient, CloudTransport, CollectionCache, DocumentGateway, FiresiteConfig,
    FiresiteResult, MapWatcher, Query, Segment, Session, WidgetInvocation,
};
use firesite_widget::scan;
use std::sync::Arc;

/// Everything a running site needs, created once at startup and torn down at
/// logout.
pub struct Firesite {
    config: FiresiteConfig,
    gateway: Arc<dyn DocumentGateway>,
    session: Arc<Session>,
    pages: CollectionCache,
    files: CollectionCache,
    admin_pages: MapWatcher,
    admin_files: MapWatcher,
}

impl Firesite {
    /// Builds the site context and starts following the auth provider.
    pub async fn init(
        config: FiresiteConfig,
        gateway: Arc<dyn DocumentGateway>,
        auth: Arc<dyn AuthProvider>,
        transport: Arc<dyn CloudTransport>,
    ) -> FiresiteResult<Self> {
        let cloud = CloudClient::new(config.api_url().map(String::from), transport, auth.clone());
        let session = Arc::new(Session::new(
            gateway.clone(),
            auth,
            cloud,
            config.password_salt_prefix.clone(),
        ));
        session.attach();

        let site = Self {
            pages: CollectionCache::new(gateway.clone(), collection::PAGE),
            files: CollectionCache::new(gateway.clone(), collection::FILE),
            admin_pages: MapWatcher::new(gateway.clone(), Query::new(collection::PAGE), true)?,
            admin_files: MapWatcher::new(gateway.clone(), Query::new(collection::FILE), true)?,
            config,
            gateway,
            session,
        };
        info!("firesite initialized ({})", site.config.env);
        Ok(site)
    }

    pub fn config(&self) -> &FiresiteConfig {
        &self.config
    }

    pub fn gateway(&self) -> &Arc<dyn DocumentGateway> {
        &self.gateway
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn pages(&self) -> &CollectionCache {
        &self.pages
    }

    pub fn files(&self) -> &CollectionCache {
        &self.files
    }

    pub fn admin_pages(&self) -> &MapWatcher {
        &self.admin_pages
    }

    pub fn admin_files(&self) -> &MapWatcher {
        &self.admin_files
    }

    pub fn start_admin_watchers(&self) -> FiresiteResult<()> {
        self.admin_pages.start()?;
        self.admin_files.start()
    }

    /// Content of a page split into text and widget occurrences.
    pub async fn page_segments(&self, id: &str) -> FiresiteResult<Vec<Segment>> {
        let page = self.pages.get(id).await?;
        Ok(scan(page.get_str(field::CONTENT).unwrap_or_default()))
    }

    /// Widgets of a page, failing on the first malformed occurrence.
    pub async fn page_widgets(&self, id: &str) -> FiresiteResult<Vec<WidgetInvocation>> {
        let mut widgets = Vec::new();
        for segment in self.page_segments(id).await? {
            match segment {
                Segment::Widget(widget) => widgets.push(widget),
                Segment::Malformed { error, .. } => return Err(error.into()),
                Segment::Text(_) => {}
            }
        }
        Ok(widgets)
    }

    /// Stops the watchers and the auth listener.
    pub fn teardown(&self) {
        self.admin_pages.stop();
        self.admin_files.stop();
        self.session.detach();
        debug!("firesite torn down");
    }

    pub async fn logout(&self) -> FiresiteResult<()> {
        self.teardown();
        self.session.logout().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        session::tests::{login_backend, MockAuth, MockCloud},
        FiresiteError, MemoryGateway, WidgetError,
    };
    use serde_json::{json, Value};

    fn fields(value: Value) -> crate::Fields {
        value.as_object().cloned().unwrap()
    }

    async fn site() -> anyhow::Result<(Arc<MemoryGateway>, Arc<MockAuth>, Firesite)> {
        let store = Arc::new(MemoryGateway::new());
        store.set(
            "Page",
            "home",
            fields(json!({"content": "Welcome {button label=\"Go\" onClick=[[go()]]} bye"})),
        );
        store.set("Page", "broken", fields(json!({"content": "a {oops x} b"})));
        store.set("File", "logo", fields(json!({"name": "logo.png"})));
        store.set("User", "alice", fields(json!({"username": "alice", "roles": {"admin": true}})));

        let auth = Arc::new(MockAuth::default());
        let config = FiresiteConfig {
            dev_func_url: Some("http://localhost/api".into()),
            ..Default::default()
        };
        let site = Firesite::init(config, store.clone(), auth.clone(), Arc::new(MockCloud::new(login_backend))).await?;
        Ok((store, auth, site))
    }

    #[tokio::test]
    async fn renders_page_segments() -> anyhow::Result<()> {
        let (_, _, site) = site().await?;

        let segments = site.page_segments("home").await?;
        assert_eq!(segments.len(), 3);
        assert_eq!(
            segments[1],
            Segment::Widget(
                WidgetInvocation::new("button")
                    .with_arg("label", "Go")
                    .with_arg("onClick", "go()")
            )
        );
        assert_eq!(site.page_widgets("home").await?.len(), 1);

        let err = site.page_widgets("broken").await.unwrap_err();
        assert!(matches!(err, FiresiteError::Parse(WidgetError::UnexpectedToken { .. })));
        assert!(matches!(
            site.page_segments("nope").await,
            Err(FiresiteError::NotFound { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn admin_watchers_are_deferred() -> anyhow::Result<()> {
        let (store, _, site) = site().await?;
        assert!(!site.admin_pages().is_started());
        assert!(site.admin_pages().current().is_empty());

        site.start_admin_watchers()?;
        assert_eq!(site.admin_pages().current().len(), 2);
        assert_eq!(site.admin_files().current().len(), 1);
        assert_eq!(store.subscriber_count(), 2);

        site.teardown();
        assert!(!site.admin_files().is_started());
        assert_eq!(store.subscriber_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn login_and_logout_through_site() -> anyhow::Result<()> {
        let (_, auth, site) = site().await?;
        assert_eq!(auth.listener_count(), 1);

        let user = site.session().login("alice", "secret").await?;
        assert!(user.has_role("member"));
        site.session().require("admin")?;

        site.logout().await?;
        assert_eq!(auth.listener_count(), 0);
        assert!(site.session().current_user_now().is_none());
        assert!(site.session().is_anonymous());
        Ok(())
    }
}
