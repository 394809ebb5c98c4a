use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};
use crate::models::Tag;
use crate::repository::Repository;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigatorState {
    path: Vec<Tag>,
    displayed: Vec<Tag>,
    max_depth: usize,
}

impl NavigatorState {
    /// Current depth below the root; the root itself is depth 0.
    pub fn depth(&self) -> usize {
        self.path.len() - 1
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn root(&self) -> &Tag {
        &self.path[0]
    }

    /// The tag whose children are displayed.
    pub fn current(&self) -> &Tag {
        &self.path[self.path.len() - 1]
    }

    /// Ancestors from the root down to the current tag.
    pub fn path(&self) -> &[Tag] {
        &self.path
    }

    pub fn displayed(&self) -> &[Tag] {
        &self.displayed
    }

    pub fn can_descend(&self) -> bool {
        self.depth() < self.max_depth
    }

    pub fn can_ascend(&self) -> bool {
        self.depth() > 0
    }

    /// Breadcrumb such as "All > Sport > Football".
    pub fn breadcrumb(&self) -> String {
        self.path
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(" > ")
    }
}

pub struct TagNavigator {
    repo: Arc<Repository>,
    root_id: String,
    max_depth: usize,
}

impl TagNavigator {
    pub fn new(repo: Arc<Repository>) -> Self {
        let settings = repo.settings();
        let root_id = settings.root_tag_id.clone();
        let max_depth = settings.max_tag_depth;
        Self {
            repo,
            root_id,
            max_depth,
        }
    }

    /// Resolve the root and display its children.
    ///
    /// An unknown or unreachable root falls back to `Tag::default_root`.
    pub async fn start(&self) -> SyncResult<NavigatorState> {
        let root = match self.repo.get_tag(&self.root_id).await {
            Ok(tag) => tag,
            Err(e) => {
                warn!(root = %self.root_id, error = %e, "Root tag unavailable, using default root");
                Tag::default_root()
            }
        };
        let displayed = self.repo.get_sub_tags(&root.id).await?;
        Ok(NavigatorState {
            path: vec![root],
            displayed,
            max_depth: self.max_depth,
        })
    }

    /// Show the children of `tag`. At max depth the state is returned
    /// unchanged.
    pub async fn descend(&self, state: &NavigatorState, tag: &Tag) -> SyncResult<NavigatorState> {
        if !state.can_descend() {
            debug!(depth = state.depth(), tag = %tag.id, "Already at max depth");
            return Ok(state.clone());
        }
        let displayed = self.repo.get_sub_tags(&tag.id).await?;
        let mut path = state.path.clone();
        path.push(tag.clone());
        Ok(NavigatorState {
            path,
            displayed,
            max_depth: state.max_depth,
        })
    }

    /// Go back to the parent. At the root the state is returned unchanged.
    pub async fn ascend(&self, state: &NavigatorState) -> SyncResult<NavigatorState> {
        if !state.can_ascend() {
            return Ok(state.clone());
        }
        let path = state.path[..state.path.len() - 1].to_vec();
        let parent = path
            .last()
            .ok_or_else(|| SyncError::not_found("tag", "root"))?;
        let displayed = self.repo.get_sub_tags(&parent.id).await?;
        Ok(NavigatorState {
            path,
            displayed,
            max_depth: state.max_depth,
        })
    }

    /// Back to the root, redisplaying its children.
    pub async fn reset(&self, state: &NavigatorState) -> SyncResult<NavigatorState> {
        let root = state.root().clone();
        let displayed = self.repo.get_sub_tags(&root.id).await?;
        Ok(NavigatorState {
            path: vec![root],
            displayed,
            max_depth: state.max_depth,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ROOT_TAG_ID;
    use crate::repository::testing::Harness;

    fn seed_tree(h: &Harness) {
        h.remote.seed_tag(Tag::new(ROOT_TAG_ID, "Everything", None));
        h.remote.seed_tag(Tag::new("sport", "Sport", Some(ROOT_TAG_ID)));
        h.remote.seed_tag(Tag::new("music", "Music", Some(ROOT_TAG_ID)));
        h.remote.seed_tag(Tag::new("football", "Football", Some("sport")));
        h.remote.seed_tag(Tag::new("five-a-side", "Five-a-side", Some("football")));
        h.remote.seed_tag(Tag::new("indoor", "Indoor", Some("five-a-side")));
    }

    #[tokio::test]
    async fn test_start_displays_root_children() {
        let h = Harness::new();
        seed_tree(&h);
        let nav = TagNavigator::new(h.repo.clone());

        let state = nav.start().await.unwrap();
        assert_eq!(state.depth(), 0);
        assert_eq!(state.root().name, "Everything");
        assert_eq!(state.displayed().len(), 2);
    }

    #[tokio::test]
    async fn test_descend_then_ascend_restores_root_view() {
        let h = Harness::new();
        seed_tree(&h);
        let nav = TagNavigator::new(h.repo.clone());
        let start = nav.start().await.unwrap();

        let sport = start.displayed().iter().find(|t| t.id == "sport").unwrap().clone();
        let down = nav.descend(&start, &sport).await.unwrap();
        assert_eq!(down.depth(), 1);
        assert_eq!(down.current().id, "sport");
        assert_eq!(down.breadcrumb(), "Everything > Sport");

        let up = nav.ascend(&down).await.unwrap();
        assert_eq!(up, start);
    }

    #[tokio::test]
    async fn test_descend_never_exceeds_max_depth() {
        let h = Harness::new();
        seed_tree(&h);
        let nav = TagNavigator::new(h.repo.clone());
        let mut state = nav.start().await.unwrap();
        let max = state.max_depth();

        for _ in 0..=max {
            let next = match state.displayed().first() {
                Some(tag) => tag.clone(),
                None => state.current().clone(),
            };
            state = nav.descend(&state, &next).await.unwrap();
            assert!(state.depth() <= max);
        }
        assert_eq!(state.depth(), max);
        assert!(!state.can_descend());
    }

    #[tokio::test]
    async fn test_ascend_at_root_is_noop() {
        let h = Harness::new();
        seed_tree(&h);
        let nav = TagNavigator::new(h.repo.clone());
        let start = nav.start().await.unwrap();
        assert_eq!(nav.ascend(&start).await.unwrap(), start);
    }

    #[tokio::test]
    async fn test_reset_returns_to_root() {
        let h = Harness::new();
        seed_tree(&h);
        let nav = TagNavigator::new(h.repo.clone());
        let start = nav.start().await.unwrap();
        let sport = Tag::new("sport", "Sport", Some(ROOT_TAG_ID));
        let football = Tag::new("football", "Football", Some("sport"));

        let deep = nav.descend(&start, &sport).await.unwrap();
        let deeper = nav.descend(&deep, &football).await.unwrap();
        assert_eq!(deeper.depth(), 2);

        let reset = nav.reset(&deeper).await.unwrap();
        assert_eq!(reset, start);
    }

    #[tokio::test]
    async fn test_unknown_root_falls_back_to_default() {
        let h = Harness::new();
        h.remote.seed_tag(Tag::new("sport", "Sport", Some(ROOT_TAG_ID)));
        let nav = TagNavigator::new(h.repo.clone());

        let state = nav.start().await.unwrap();
        assert_eq!(state.root(), &Tag::default_root());
        assert_eq!(state.displayed().len(), 1);
    }

    #[tokio::test]
    async fn test_navigation_offline_uses_cached_children() {
        let h = Harness::new();
        seed_tree(&h);
        let nav = TagNavigator::new(h.repo.clone());
        let start = nav.start().await.unwrap();
        let sport = Tag::new("sport", "Sport", Some(ROOT_TAG_ID));
        nav.descend(&start, &sport).await.unwrap();

        h.go_offline();
        let offline_start = nav.start().await.unwrap();
        assert_eq!(offline_start, start);
        assert!(nav.descend(&offline_start, &sport).await.is_ok());

        let music = Tag::new("music", "Music", Some(ROOT_TAG_ID));
        assert!(matches!(
            nav.descend(&offline_start, &music).await,
            Err(SyncError::DataUnavailableOffline { .. })
        ));
    }
}
