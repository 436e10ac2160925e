//! In-memory driver for exercising the checkout stages without a browser
//!
//! A [`ScriptedDriver`] holds a flat model of a page: elements keyed by
//! scope and selector, the attached frames, and reactions that mutate the
//! model when a control is clicked or checked. Waits poll the model on the
//! tokio clock, so tests run with `start_paused = true` finish instantly
//! even when a bound has to elapse.

use async_trait::async_trait;
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;

use super::{Driver, FrameInfo, LoadState, Locator, Scope, Selector, WaitState};
use crate::error::{E2eError, E2eResult};

const POLL: Duration = Duration::from_millis(50);

/// One element in the model
#[derive(Debug, Clone)]
pub struct Element {
    pub scope: Scope,
    pub selector: Selector,
    pub text: String,
    pub visible: bool,
    pub enabled: bool,
    pub checked: bool,
    pub value: String,
    pub attributes: HashMap<String, String>,
}

impl Element {
    fn new(selector: Selector) -> Self {
        Self {
            scope: Scope::Page,
            selector,
            text: String::new(),
            visible: true,
            enabled: true,
            checked: false,
            value: String::new(),
            attributes: HashMap::new(),
        }
    }

    pub fn css(css: impl Into<String>) -> Self {
        Self::new(Selector::Css { css: css.into() })
    }

    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(Selector::Role { role: role.into(), name: name.into() })
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn in_frame(mut self, frame_css: impl Into<String>) -> Self {
        self.scope = Scope::FrameElement(frame_css.into());
        self
    }

    /// Content of the embedded document at exactly this URL
    pub fn in_frame_url(mut self, url: impl Into<String>) -> Self {
        self.scope = Scope::FrameUrl(url.into());
        self
    }
}

/// Model mutation applied when a reaction fires
#[derive(Debug, Clone)]
pub enum Effect {
    Navigate(String),
    Add(Element),
    Show(Selector),
    Hide(Selector),
    Remove(Selector),
    AttachFrame(FrameInfo),
    /// Detach every frame whose URL contains the marker
    DetachFrame(String),
    SetAttribute { selector: Selector, name: String, value: String },
}

#[derive(Debug, Clone, PartialEq)]
enum Trigger {
    Click(Selector),
    SetChecked(Selector, bool),
}

#[derive(Debug, Clone)]
struct Reaction {
    trigger: Trigger,
    effects: Vec<Effect>,
}

/// Operation a fault applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOp {
    Click,
    DomClick,
    Screenshot,
}

/// Error a fault raises
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Timeout,
    Detached,
    Other,
}

#[derive(Debug, Clone)]
struct Fault {
    op: FaultOp,
    selector: Option<Selector>,
    kind: FaultKind,
    remaining: usize,
}

/// Recorded interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub op: &'static str,
    pub target: String,
    pub value: Option<String>,
}

#[derive(Debug, Default)]
struct PageModel {
    url: String,
    navigations: u64,
    elements: Vec<Element>,
    frames: Vec<FrameInfo>,
    /// Frames that attach once `frames()` has been called this many times
    scheduled_frames: Vec<(usize, FrameInfo)>,
    /// Effects applied once the tokio clock passes their deadline
    timed: Vec<(Instant, Vec<Effect>)>,
    frame_polls: usize,
    reactions: Vec<Reaction>,
    faults: Vec<Fault>,
    actions: Vec<Action>,
}

/// Scriptable in-memory page
#[derive(Debug, Default)]
pub struct ScriptedDriver {
    model: Mutex<PageModel>,
}

fn selector_eq(a: &Selector, b: &Selector) -> bool {
    match (a, b) {
        (Selector::Role { role: ra, name: na }, Selector::Role { role: rb, name: nb }) => {
            ra == rb && na.eq_ignore_ascii_case(nb)
        }
        _ => a == b,
    }
}

impl PageModel {
    /// Indices of elements matching a locator, after filters and `nth`
    fn resolve(&self, locator: &Locator) -> E2eResult<Vec<usize>> {
        let scope = match &locator.scope {
            Scope::FrameUrl(marker) => {
                let frame = self
                    .frames
                    .iter()
                    .find(|f| f.url.contains(marker.as_str()))
                    .ok_or_else(|| {
                        E2eError::FrameDetached(format!("no frame with url containing '{}'", marker))
                    })?;
                Scope::FrameUrl(frame.url.clone())
            }
            other => other.clone(),
        };

        let matches: Vec<usize> = self
            .elements
            .iter()
            .enumerate()
            .filter(|(_, e)| e.scope == scope && selector_eq(&e.selector, &locator.selector))
            .filter(|(_, e)| {
                locator.has_text.as_ref().map_or(true, |t| e.text.contains(t.as_str()))
            })
            .filter(|(_, e)| {
                locator.has_not_text.as_ref().map_or(true, |t| !e.text.contains(t.as_str()))
            })
            .map(|(i, _)| i)
            .collect();

        Ok(match locator.nth {
            Some(n) => matches.get(n).copied().into_iter().collect(),
            None => matches,
        })
    }

    fn single(&self, locator: &Locator) -> E2eResult<usize> {
        self.resolve(locator)?
            .first()
            .copied()
            .ok_or_else(|| E2eError::Timeout(format!("no element matches {}", locator)))
    }

    fn state_reached(&self, locator: &Locator, state: WaitState) -> E2eResult<bool> {
        let matches = self.resolve(locator)?;
        Ok(match state {
            WaitState::Visible => matches.iter().any(|&i| self.elements[i].visible),
            WaitState::Hidden => !matches.iter().any(|&i| self.elements[i].visible),
            WaitState::Attached => !matches.is_empty(),
            WaitState::Detached => matches.is_empty(),
        })
    }

    fn take_fault(&mut self, op: FaultOp, locator: Option<&Locator>) -> Option<E2eError> {
        let position = self.faults.iter().position(|f| {
            f.op == op
                && f.remaining > 0
                && match (&f.selector, locator) {
                    (Some(s), Some(l)) => selector_eq(s, &l.selector),
                    (None, _) => true,
                    (Some(_), None) => false,
                }
        })?;
        let fault = &mut self.faults[position];
        fault.remaining -= 1;
        let target = locator.map(|l| l.to_string()).unwrap_or_default();
        Some(match fault.kind {
            FaultKind::Timeout => E2eError::Timeout(format!("injected: {}", target)),
            FaultKind::Detached => E2eError::FrameDetached(format!("injected: {}", target)),
            FaultKind::Other => E2eError::Driver(format!("injected: {}", target)),
        })
    }

    fn record(&mut self, op: &'static str, locator: &Locator, value: Option<&str>) {
        self.actions.push(Action {
            op,
            target: locator.to_string(),
            value: value.map(str::to_string),
        });
    }

    fn fire(&mut self, trigger: &Trigger) {
        let effects: Vec<Effect> = self
            .reactions
            .iter()
            .filter(|r| match (&r.trigger, trigger) {
                (Trigger::Click(a), Trigger::Click(b)) => selector_eq(a, b),
                (Trigger::SetChecked(a, x), Trigger::SetChecked(b, y)) => selector_eq(a, b) && x == y,
                _ => false,
            })
            .flat_map(|r| r.effects.clone())
            .collect();

        for effect in effects {
            self.apply(effect);
        }
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::Navigate(url) => {
                self.url = url;
                self.navigations += 1;
            }
            Effect::Add(element) => self.elements.push(element),
            Effect::Show(selector) => self.set_visible(&selector, true),
            Effect::Hide(selector) => self.set_visible(&selector, false),
            Effect::Remove(selector) => self.elements.retain(|e| !selector_eq(&e.selector, &selector)),
            Effect::AttachFrame(frame) => self.frames.push(frame),
            Effect::DetachFrame(marker) => self.frames.retain(|f| !f.url.contains(marker.as_str())),
            Effect::SetAttribute { selector, name, value } => {
                for element in self.elements.iter_mut().filter(|e| selector_eq(&e.selector, &selector)) {
                    element.attributes.insert(name.clone(), value.clone());
                }
            }
        }
    }

    fn apply_due(&mut self) {
        let now = Instant::now();
        let (due, pending): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.timed).into_iter().partition(|(at, _)| *at <= now);
        self.timed = pending;
        for effect in due.into_iter().flat_map(|(_, effects)| effects) {
            self.apply(effect);
        }
    }

    fn set_visible(&mut self, selector: &Selector, visible: bool) {
        for element in self.elements.iter_mut().filter(|e| selector_eq(&e.selector, selector)) {
            element.visible = visible;
        }
    }
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PageModel> {
        let mut model = self.model.lock();
        model.apply_due();
        model
    }

    pub fn with_url(self, url: impl Into<String>) -> Self {
        self.lock().url = url.into();
        self
    }

    pub fn add(&self, element: Element) -> &Self {
        self.lock().elements.push(element);
        self
    }

    pub fn attach_frame(&self, name: impl Into<String>, url: impl Into<String>) -> &Self {
        self.lock().frames.push(FrameInfo { name: name.into(), url: url.into() });
        self
    }

    /// Attach a frame once `frames()` has been polled `after_polls` times
    pub fn attach_frame_after(&self, after_polls: usize, name: impl Into<String>, url: impl Into<String>) -> &Self {
        self.model
            .lock()
            .scheduled_frames
            .push((after_polls, FrameInfo { name: name.into(), url: url.into() }));
        self
    }

    /// Apply `effects` once `delay` has passed on the tokio clock
    pub fn apply_after(&self, delay: Duration, effects: Vec<Effect>) -> &Self {
        let at = Instant::now() + delay;
        self.lock().timed.push((at, effects));
        self
    }

    pub fn on_click(&self, selector: Selector, effects: Vec<Effect>) -> &Self {
        self.lock().reactions.push(Reaction { trigger: Trigger::Click(selector), effects });
        self
    }

    pub fn on_set_checked(&self, selector: Selector, checked: bool, effects: Vec<Effect>) -> &Self {
        self.model
            .lock()
            .reactions
            .push(Reaction { trigger: Trigger::SetChecked(selector, checked), effects });
        self
    }

    /// Make the next `times` matching operations fail
    pub fn fail(&self, op: FaultOp, selector: Option<Selector>, kind: FaultKind, times: usize) -> &Self {
        self.lock().faults.push(Fault { op, selector, kind, remaining: times });
        self
    }

    pub fn actions(&self) -> Vec<Action> {
        self.lock().actions.clone()
    }

    /// Recorded actions of one kind whose target contains `needle`
    pub fn actions_on(&self, op: &str, needle: &str) -> Vec<Action> {
        self.model
            .lock()
            .actions
            .iter()
            .filter(|a| a.op == op && a.target.contains(needle))
            .cloned()
            .collect()
    }

    /// Current value of the first element matching the locator
    pub fn value_of(&self, locator: &Locator) -> Option<String> {
        let model = self.lock();
        let index = model.single(locator).ok()?;
        Some(model.elements[index].value.clone())
    }

    pub fn frame_polls(&self) -> usize {
        self.lock().frame_polls
    }

    async fn poll<F>(&self, timeout: Duration, what: String, mut check: F) -> E2eResult<()>
    where
        F: FnMut(&PageModel) -> E2eResult<bool> + Send,
    {
        let deadline = Instant::now() + timeout;
        loop {
            let reached = {
                let model = self.lock();
                check(&model)?
            };
            if reached {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(E2eError::Timeout(format!("{} after {:?}", what, timeout)));
            }
            tokio::time::sleep(POLL).await;
        }
    }

    fn interact(&self, op: &'static str, locator: &Locator, value: Option<&str>, need_visible: bool) -> E2eResult<usize> {
        let mut model = self.lock();
        let index = model.single(locator)?;
        let element = &model.elements[index];
        if need_visible && !element.visible {
            return Err(E2eError::Timeout(format!("{} is not visible", locator)));
        }
        model.record(op, locator, value);
        Ok(index)
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        let mut model = self.lock();
        model.url = url.to_string();
        model.navigations += 1;
        model.actions.push(Action { op: "goto", target: url.to_string(), value: None });
        Ok(())
    }

    async fn current_url(&self) -> E2eResult<String> {
        Ok(self.lock().url.clone())
    }

    async fn wait_for(&self, locator: &Locator, state: WaitState, timeout: Duration) -> E2eResult<()> {
        let what = format!("{} to be {}", locator, state.as_str());
        self.poll(timeout, what, |model| model.state_reached(locator, state)).await
    }

    async fn is_visible(&self, locator: &Locator) -> E2eResult<bool> {
        self.lock().state_reached(locator, WaitState::Visible)
    }

    async fn is_enabled(&self, locator: &Locator) -> E2eResult<bool> {
        let model = self.lock();
        let index = model.single(locator)?;
        Ok(model.elements[index].enabled)
    }

    async fn is_checked(&self, locator: &Locator) -> E2eResult<bool> {
        let model = self.lock();
        let index = model.single(locator)?;
        Ok(model.elements[index].checked)
    }

    async fn count(&self, locator: &Locator) -> E2eResult<usize> {
        Ok(self.lock().resolve(locator)?.len())
    }

    async fn click(&self, locator: &Locator, _timeout: Duration) -> E2eResult<()> {
        let mut model = self.lock();
        if let Some(err) = model.take_fault(FaultOp::Click, Some(locator)) {
            return Err(err);
        }
        let index = model.single(locator)?;
        let element = &model.elements[index];
        if !element.visible || !element.enabled {
            return Err(E2eError::Timeout(format!("{} is not actionable", locator)));
        }
        model.record("click", locator, None);
        model.fire(&Trigger::Click(locator.selector.clone()));
        Ok(())
    }

    async fn dom_click(&self, locator: &Locator) -> E2eResult<()> {
        let mut model = self.lock();
        if let Some(err) = model.take_fault(FaultOp::DomClick, Some(locator)) {
            return Err(err);
        }
        model.single(locator)?;
        model.record("dom_click", locator, None);
        model.fire(&Trigger::Click(locator.selector.clone()));
        Ok(())
    }

    async fn fill(&self, locator: &Locator, value: &str) -> E2eResult<()> {
        let index = self.interact("fill", locator, Some(value), true)?;
        self.lock().elements[index].value = value.to_string();
        Ok(())
    }

    async fn type_text(&self, locator: &Locator, text: &str) -> E2eResult<()> {
        let index = self.interact("type", locator, Some(text), true)?;
        self.lock().elements[index].value.push_str(text);
        Ok(())
    }

    async fn press(&self, locator: &Locator, key: &str) -> E2eResult<()> {
        self.interact("press", locator, Some(key), true).map(|_| ())
    }

    async fn select_option(&self, locator: &Locator, value: &str) -> E2eResult<()> {
        let index = self.interact("select", locator, Some(value), true)?;
        self.lock().elements[index].value = value.to_string();
        Ok(())
    }

    async fn set_checked(&self, locator: &Locator, checked: bool) -> E2eResult<()> {
        let index = self.interact("set_checked", locator, Some(&checked.to_string()), true)?;
        let mut model = self.lock();
        model.elements[index].checked = checked;
        model.fire(&Trigger::SetChecked(locator.selector.clone(), checked));
        Ok(())
    }

    async fn text_content(&self, locator: &Locator) -> E2eResult<Option<String>> {
        let model = self.lock();
        let index = model.single(locator)?;
        Ok(Some(model.elements[index].text.clone()))
    }

    async fn all_text_contents(&self, locator: &Locator) -> E2eResult<Vec<String>> {
        let model = self.lock();
        Ok(model
            .resolve(locator)?
            .into_iter()
            .map(|i| model.elements[i].text.clone())
            .collect())
    }

    async fn get_attribute(&self, locator: &Locator, name: &str) -> E2eResult<Option<String>> {
        let model = self.lock();
        let index = model.single(locator)?;
        Ok(model.elements[index].attributes.get(name).cloned())
    }

    async fn wait_for_url(&self, pattern: &str, timeout: Duration) -> E2eResult<()> {
        let re = regex::Regex::new(pattern)
            .map_err(|e| E2eError::Driver(format!("bad url pattern {}: {}", pattern, e)))?;
        let what = format!("url matching /{}/", pattern);
        self.poll(timeout, what, |model| Ok(re.is_match(&model.url))).await
    }

    async fn wait_for_navigation(&self, timeout: Duration) -> E2eResult<()> {
        let start = self.lock().navigations;
        self.poll(timeout, "navigation".to_string(), |model| Ok(model.navigations > start))
            .await
    }

    async fn wait_for_load_state(&self, _state: LoadState, _timeout: Duration) -> E2eResult<()> {
        Ok(())
    }

    async fn frames(&self) -> E2eResult<Vec<FrameInfo>> {
        let mut model = self.lock();
        model.frame_polls += 1;
        let polls = model.frame_polls;
        let (due, later): (Vec<_>, Vec<_>) = std::mem::take(&mut model.scheduled_frames)
            .into_iter()
            .partition(|(after, _)| *after <= polls);
        model.scheduled_frames = later;
        model.frames.extend(due.into_iter().map(|(_, frame)| frame));
        Ok(model.frames.clone())
    }

    async fn screenshot(&self, path: &Path, _full_page: bool) -> E2eResult<()> {
        {
            let mut model = self.lock();
            if let Some(err) = model.take_fault(FaultOp::Screenshot, None) {
                return Err(err);
            }
            model.actions.push(Action {
                op: "screenshot",
                target: path.to_string_lossy().to_string(),
                value: None,
            });
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, b"\x89PNG\r\n\x1a\n")?;
        Ok(())
    }

    async fn close(&self) -> E2eResult<()> {
        let mut model = self.lock();
        let url = model.url.clone();
        model.actions.push(Action { op: "close", target: url, value: None });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn css(s: &str) -> Selector {
        Selector::Css { css: s.to_string() }
    }

    #[tokio::test]
    async fn test_filters_and_nth() {
        let driver = ScriptedDriver::new();
        driver
            .add(Element::css("button.order").text("Place Order").hidden())
            .add(Element::css("button.order").text("Place Order with GooglePay"))
            .add(Element::css("button.order").text("Place Order"));

        let locator = Locator::css("button.order").has_not_text("GooglePay");
        assert_eq!(driver.count(&locator).await.unwrap(), 2);
        assert!(driver.is_visible(&locator.clone().nth(1)).await.unwrap());
        assert!(!driver.is_visible(&locator.nth(0)).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_reaction_and_navigation_wait() {
        let driver = ScriptedDriver::new().with_url("https://shop.test/cart");
        driver
            .add(Element::css("#go"))
            .on_click(css("#go"), vec![Effect::Navigate("https://shop.test/checkout/".into())]);

        let go = Locator::css("#go");
        let (nav, click) = tokio::join!(
            driver.wait_for_navigation(Duration::from_secs(15)),
            driver.click(&go, Duration::from_secs(5))
        );
        nav.unwrap();
        click.unwrap();
        assert_eq!(driver.current_url().await.unwrap(), "https://shop.test/checkout/");
    }

    #[tokio::test]
    async fn test_frame_url_scope_detaches() {
        let driver = ScriptedDriver::new();
        driver
            .attach_frame("acs", "https://acs.modirum.test/challenge")
            .add(Element::css("button#yes").in_frame_url("https://acs.modirum.test/challenge"));

        let yes = Locator::css("button#yes").in_frame_url("modirum");
        assert!(driver.is_visible(&yes).await.unwrap());

        driver.model.lock().apply(Effect::DetachFrame("modirum".into()));
        assert!(matches!(driver.is_visible(&yes).await, Err(E2eError::FrameDetached(_))));
    }

    #[tokio::test]
    async fn test_injected_fault_is_consumed() {
        let driver = ScriptedDriver::new();
        driver
            .add(Element::css("#btn"))
            .fail(FaultOp::Click, Some(css("#btn")), FaultKind::Timeout, 1);

        let btn = Locator::css("#btn");
        assert!(driver.click(&btn, Duration::from_secs(1)).await.is_err());
        driver.click(&btn, Duration::from_secs(1)).await.unwrap();
        assert_eq!(driver.actions_on("click", "#btn").len(), 1);
    }
}
