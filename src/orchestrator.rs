use crate::client::Transport;
use crate::error::{ConfigError, RequestError};
use crate::forum::Forum;
use crate::types::{BrowseReport, CredentialBundle, LikeOutcome, LikeResult, RunSummary, TopicRecord};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

/// The feed page every run starts from.
pub const FIRST_PAGE: u32 = 1;

/// Waits between likes. Swapped out in tests so runs don't sleep.
pub trait Pacer {
    fn pause(&mut self, delay: Duration) -> impl Future<Output = ()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPacer;

impl Pacer for TokioPacer {
    async fn pause(&mut self, delay: Duration) {
        tokio::time::sleep(delay).await
    }
}

/// Inclusive range the pause between likes is drawn from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayRange {
    min: Duration,
    max: Duration,
}

impl DelayRange {
    pub fn from_secs(min: f64, max: f64) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::DelayRange { min, max };
        if min > max {
            return Err(invalid());
        }
        // Rejects negatives, NaN, infinities and values past `Duration::MAX`.
        Ok(DelayRange {
            min: Duration::try_from_secs_f64(min).map_err(|_| invalid())?,
            max: Duration::try_from_secs_f64(max).map_err(|_| invalid())?,
        })
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> Duration {
        rng.gen_range(self.min..=self.max)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LikePlan {
    pub max_likes: usize,
    /// `None` browses the whole page.
    pub browse_limit: Option<usize>,
    pub delay: DelayRange,
}

/// The leading `limit` topics, or all of them when the limit is absent or
/// not smaller than what is available.
pub fn browse_window<T>(available: &[T], limit: Option<usize>) -> &[T] {
    match limit {
        Some(limit) if limit < available.len() => &available[..limit],
        _ => available,
    }
}

/// Everything when there are at most `max` items, otherwise exactly `max`
/// distinct items drawn uniformly. Feed order is kept either way.
pub fn select<T: Clone, R: Rng>(browsed: &[T], max: usize, rng: &mut R) -> Vec<T> {
    if browsed.len() <= max {
        return browsed.to_vec();
    }
    let mut indices = rand::seq::index::sample(rng, browsed.len(), max).into_vec();
    indices.sort_unstable();
    indices.into_iter().map(|i| browsed[i].clone()).collect()
}

/// Browses the latest feed and likes a random handful of topics, pausing a
/// random while between each.
pub struct AutoLiker<'a, T: Transport, R: Rng, P: Pacer> {
    forum: &'a Forum<T>,
    rng: R,
    pacer: P,
}

impl<'a, T: Transport, R: Rng, P: Pacer> AutoLiker<'a, T, R, P> {
    pub fn new(forum: &'a Forum<T>, rng: R, pacer: P) -> Self {
        AutoLiker { forum, rng, pacer }
    }

    pub fn pacer(&self) -> &P {
        &self.pacer
    }

    /// Lists the first page without liking anything.
    pub async fn browse(
        &self,
        bundle: &CredentialBundle,
        browse_limit: Option<usize>,
    ) -> Result<BrowseReport, RequestError> {
        let available = self.forum.list_topics(bundle, FIRST_PAGE).await?;
        let browsed = browse_window(&available, browse_limit).to_vec();
        info!(available = available.len(), browsed = browsed.len(), "browsed topics");
        Ok(BrowseReport {
            total_available: available.len(),
            browsed,
        })
    }

    pub async fn run(
        &mut self,
        bundle: &CredentialBundle,
        plan: &LikePlan,
    ) -> Result<RunSummary, RequestError> {
        let available = self.forum.list_topics(bundle, FIRST_PAGE).await?;
        let browsed = browse_window(&available, plan.browse_limit);
        for topic in browsed {
            debug!(
                topic_id = topic.id,
                title = %topic.title,
                likes = topic.like_count,
                replies = topic.reply_count,
                "browsing"
            );
        }

        let selected = select(browsed, plan.max_likes, &mut self.rng);
        info!(
            available = available.len(),
            browsed = browsed.len(),
            selected = selected.len(),
            "starting likes"
        );

        let mut outcomes = Vec::with_capacity(selected.len());
        for (i, topic) in selected.iter().enumerate() {
            outcomes.push(self.like_topic(bundle, topic).await);

            if i + 1 < selected.len() {
                let delay = plan.delay.sample(&mut self.rng);
                debug!(delay_secs = delay.as_secs_f64(), "pausing");
                self.pacer.pause(delay).await;
            }
        }

        let summary = RunSummary::new(available.len(), browsed.len(), selected.len(), outcomes);
        info!(
            success = summary.success_count,
            failed = summary.failure_count,
            "run finished"
        );
        Ok(summary)
    }

    async fn like_topic(&self, bundle: &CredentialBundle, topic: &TopicRecord) -> LikeOutcome {
        let result = match self.forum.resolve_first_post(bundle, topic.id).await {
            Some(post_id) => self.forum.toggle_like(bundle, post_id, topic.id).await,
            None => {
                info!(topic_id = topic.id, "skipping topic, first post unresolved");
                LikeResult::Unresolved
            }
        };
        LikeOutcome {
            topic_id: topic.id,
            title: topic.title.clone(),
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RawResponse;
    use crate::testing::{bundle, json, MockTransport};
    use crate::types::HttpRequest;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[derive(Debug, Default)]
    struct RecordingPacer {
        pauses: Vec<Duration>,
    }

    impl Pacer for RecordingPacer {
        async fn pause(&mut self, delay: Duration) {
            self.pauses.push(delay);
        }
    }

    fn like_endpoint(post_id: u64) -> String {
        format!("/discourse-reactions/posts/{}/custom-reactions/heart/toggle.json", post_id)
    }

    fn feed(count: u64) -> RawResponse {
        let topics = (1..=count)
            .map(|id| format!(r#"{{"id": {id}, "fancy_title": "Topic {id}", "posts_count": 2}}"#))
            .collect::<Vec<String>>()
            .join(",");
        json(200, &format!(r#"{{"topic_list": {{"topics": [{}]}}}}"#, topics))
    }

    /// Feed of `count` topics where topic `n` has first post `n * 100` and every
    /// like is accepted.
    fn forum_with(count: u64) -> MockTransport {
        let mut mock = MockTransport::new().route("GET", "/latest.json", feed(count));
        for id in 1..=count {
            mock = mock
                .route(
                    "GET",
                    &format!("/t/{}", id),
                    json(200, &format!(r#"{{"post_stream": {{"posts": [{{"id": {}}}]}}}}"#, id * 100)),
                )
                .route("PUT", &like_endpoint(id * 100), json(200, "{}"));
        }
        mock
    }

    fn plan(max_likes: usize, browse_limit: Option<usize>) -> LikePlan {
        LikePlan {
            max_likes,
            browse_limit,
            delay: DelayRange::from_secs(2.0, 5.0).unwrap(),
        }
    }

    fn liked_topics(calls: &[HttpRequest]) -> Vec<u64> {
        calls
            .iter()
            .filter(|call| call.method() == "PUT")
            .filter_map(|call| call.endpoint().split('/').nth(3)?.parse::<u64>().ok())
            .map(|post_id| post_id / 100)
            .collect()
    }

    #[test]
    fn browse_window_bounds() {
        let available: Vec<u32> = (0..10).collect();
        for limit in [10, 11, 100] {
            assert_eq!(browse_window(&available, Some(limit)), &available[..]);
        }
        assert_eq!(browse_window(&available, None), &available[..]);
        assert_eq!(browse_window(&available, Some(4)), &[0, 1, 2, 3]);
    }

    #[test]
    fn select_everything_when_under_max() {
        let browsed: Vec<u32> = (0..5).collect();
        let mut rng = StdRng::seed_from_u64(7);
        for max in 5..10 {
            assert_eq!(select(&browsed, max, &mut rng), browsed);
        }
    }

    #[test]
    fn select_exact_distinct_subset() {
        let browsed: Vec<u32> = (0..20).collect();
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            for max in 0..20 {
                let picked = select(&browsed, max, &mut rng);
                assert_eq!(picked.len(), max);
                let unique: HashSet<u32> = picked.iter().copied().collect();
                assert_eq!(unique.len(), max);
                assert!(picked.iter().all(|p| browsed.contains(p)));
                assert!(picked.windows(2).all(|w| w[0] < w[1]), "feed order kept");
            }
        }
    }

    #[test]
    fn delay_range_validation_and_sampling() {
        assert!(DelayRange::from_secs(5.0, 2.0).is_err());
        assert!(DelayRange::from_secs(-1.0, 2.0).is_err());
        assert!(DelayRange::from_secs(f64::NAN, 2.0).is_err());
        assert!(DelayRange::from_secs(1.0, f64::INFINITY).is_err());
        assert!(matches!(
            DelayRange::from_secs(1.0, 1e30),
            Err(ConfigError::DelayRange { .. })
        ));

        let fixed = DelayRange::from_secs(1.5, 1.5).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(fixed.sample(&mut rng), Duration::from_millis(1500));

        let range = DelayRange::from_secs(2.0, 5.0).unwrap();
        for _ in 0..100 {
            let d = range.sample(&mut rng);
            assert!(d >= range.min() && d <= range.max());
        }
    }

    #[tokio::test]
    async fn likes_every_topic_when_feed_is_small() {
        let forum = Forum::new(forum_with(3), "https://forum.test");
        let mut liker = AutoLiker::new(&forum, StdRng::seed_from_u64(3), RecordingPacer::default());

        let summary = liker.run(&bundle(), &plan(5, None)).await.unwrap();

        assert_eq!(summary.total_available, 3);
        assert_eq!(summary.browsed, 3);
        assert_eq!(summary.selected, 3);
        assert_eq!(summary.success_count, 3);
        assert_eq!(summary.failure_count, 0);
        assert_eq!(
            summary.outcomes.iter().map(|o| o.topic_id).collect::<Vec<u64>>(),
            vec![1, 2, 3]
        );
        assert_eq!(summary.outcomes[0].result.post_id(), Some(100));

        let pauses = &liker.pacer().pauses;
        assert_eq!(pauses.len(), 2, "no pause after the last topic");
        assert!(pauses
            .iter()
            .all(|d| *d >= Duration::from_secs(2) && *d <= Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn samples_only_from_browsed_window() {
        for seed in 0..10 {
            let forum = Forum::new(forum_with(10), "https://forum.test");
            let mut liker =
                AutoLiker::new(&forum, StdRng::seed_from_u64(seed), RecordingPacer::default());

            let summary = liker.run(&bundle(), &plan(3, Some(5))).await.unwrap();

            assert_eq!(summary.total_available, 10);
            assert_eq!(summary.browsed, 5);
            assert_eq!(summary.selected, 3);
            assert_eq!(summary.success_count + summary.failure_count, summary.selected);

            let liked = liked_topics(&forum.transport().calls());
            assert_eq!(liked.len(), 3);
            assert!(liked.iter().all(|id| (1..=5).contains(id)));
            let unique: HashSet<u64> = liked.iter().copied().collect();
            assert_eq!(unique.len(), 3);
        }
    }

    #[tokio::test]
    async fn unresolved_topic_is_never_liked() {
        let mock = forum_with(3).route("GET", "/t/2", json(200, r#"{"post_stream": {"posts": []}}"#));
        let forum = Forum::new(mock, "https://forum.test");
        let mut liker = AutoLiker::new(&forum, StdRng::seed_from_u64(0), RecordingPacer::default());

        let summary = liker.run(&bundle(), &plan(5, None)).await.unwrap();

        assert_eq!(summary.success_count, 2);
        assert_eq!(summary.failure_count, 1);
        let skipped = &summary.outcomes[1];
        assert_eq!(skipped.topic_id, 2);
        assert_eq!(skipped.result, LikeResult::Unresolved);
        assert!(!skipped.success());
        assert_eq!(liked_topics(&forum.transport().calls()), vec![1, 3]);
        assert_eq!(liker.pacer().pauses.len(), 2);
    }

    #[tokio::test]
    async fn rejected_likes_count_as_failures() {
        let mock = forum_with(2).route("PUT", &like_endpoint(200), json(403, "not allowed"));
        let forum = Forum::new(mock, "https://forum.test");
        let mut liker = AutoLiker::new(&forum, StdRng::seed_from_u64(0), RecordingPacer::default());

        let summary = liker.run(&bundle(), &plan(2, None)).await.unwrap();

        assert_eq!(summary.success_count, 1);
        assert_eq!(summary.failure_count, 1);
        assert_eq!(summary.outcomes[1].result.status(), Some(403));
    }

    #[tokio::test]
    async fn listing_failure_aborts_run() {
        let mock = MockTransport::new().route("GET", "/latest.json", json(502, "bad gateway"));
        let forum = Forum::new(mock, "https://forum.test");
        let mut liker = AutoLiker::new(&forum, StdRng::seed_from_u64(0), RecordingPacer::default());

        let err = liker.run(&bundle(), &plan(5, None)).await.unwrap_err();

        assert!(matches!(err, RequestError::Status { status: 502, .. }));
        assert_eq!(forum.transport().calls().len(), 1);
        assert!(liker.pacer().pauses.is_empty());
    }

    #[tokio::test]
    async fn browse_mode_never_likes() {
        let forum = Forum::new(forum_with(8), "https://forum.test");
        let liker = AutoLiker::new(&forum, StdRng::seed_from_u64(0), RecordingPacer::default());

        let report = liker.browse(&bundle(), Some(3)).await.unwrap();

        assert_eq!(report.total_available, 8);
        assert_eq!(
            report.browsed.iter().map(|t| t.id).collect::<Vec<u64>>(),
            vec![1, 2, 3]
        );
        assert_eq!(report.browsed[0].reply_count, 1);
        assert!(forum.transport().calls_with("PUT").is_empty());
    }
}
