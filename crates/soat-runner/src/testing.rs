//! In-memory browser used by the unit tests.
//!
//! A [`FakeDriver`] holds a flat list of [`FakeNode`]s. Interactions are
//! recorded as [`Event`]s and fed to hooks that mutate the page, and timers
//! fire on the first driver call after their (tokio) deadline, so tests run
//! with paused time.

use crate::browser::{BoundingBox, Driver, Element, Interaction, SessionProvider};
use crate::config::{BrowserConfig, Config};
use crate::locator::{normalize, text_matches, Locator};
use crate::{Error, Result};
use async_trait::async_trait;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

pub const BASE_URL: &str = "https://soat.test/soat-digital/";

/// Default config pointed at [`BASE_URL`], writing evidence into `dir`.
pub fn config(dir: &Path) -> Config {
    let mut config = Config::parse(&format!(
        "name: test\napp:\n  base_url: \"{}\"\n",
        BASE_URL
    ))
    .unwrap();
    config.evidence.dir = dir.to_path_buf();
    config
}

#[derive(Debug, Clone)]
pub struct FakeNode {
    pub key: String,
    pub tag: String,
    pub id: Option<String>,
    pub class_name: String,
    pub text: String,
    pub value: String,
    pub visible: bool,
    pub enabled: bool,
    pub readonly: bool,
    pub input_type: Option<String>,
    pub in_label: bool,
    pub parent: Option<String>,
    /// Extra CSS selectors this node answers to.
    pub selectors: Vec<String>,
    pub bbox: BoundingBox,
}

impl FakeNode {
    pub fn new(key: &str, tag: &str) -> Self {
        Self {
            key: key.into(),
            tag: tag.into(),
            id: None,
            class_name: String::new(),
            text: String::new(),
            value: String::new(),
            visible: true,
            enabled: true,
            readonly: false,
            input_type: None,
            in_label: false,
            parent: None,
            selectors: Vec::new(),
            bbox: BoundingBox {
                x: 10.0,
                y: 10.0,
                width: 60.0,
                height: 20.0,
            },
        }
    }

    pub fn input(key: &str) -> Self {
        let mut node = Self::new(key, "input");
        node.input_type = Some("text".into());
        node.selectors.push("input".into());
        node
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.into();
        self
    }

    pub fn class(mut self, class: &str) -> Self {
        self.class_name = class.into();
        self
    }

    pub fn selector(mut self, selector: &str) -> Self {
        self.selectors.push(selector.into());
        self
    }

    pub fn parent(mut self, key: &str) -> Self {
        self.parent = Some(key.into());
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

    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    pub fn in_label(mut self) -> Self {
        self.in_label = true;
        self
    }

    pub fn handle(&self) -> String {
        format!("[data-soat-ref=\"{}\"]", self.key)
    }

    fn matches_css(&self, selector: &str) -> bool {
        selector.split(',').map(str::trim).any(|part| {
            part == self.tag
                || part == self.handle()
                || self.selectors.iter().any(|s| s == part)
                || part
                    .strip_prefix('#')
                    .is_some_and(|id| self.id.as_deref() == Some(id))
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Goto(String),
    Click { key: String, how: Interaction },
    Cleared(String),
    Typed { key: String, text: String },
    Key { key: String, name: String },
    Scrolled(String),
}

impl Event {
    pub fn is_click_on(&self, node: &str) -> bool {
        matches!(self, Event::Click { key, .. } if key == node)
    }
}

type Timer = (Instant, Box<dyn FnOnce(&mut FakePage) + Send>);
type Hook = Box<dyn FnMut(&Event, &mut FakePage) + Send>;

/// Mutable page state handed to hooks and timers.
pub struct FakePage {
    pub url: String,
    nodes: Vec<FakeNode>,
    timers: Vec<Timer>,
}

impl FakePage {
    pub fn add(&mut self, node: FakeNode) {
        self.nodes.push(node);
    }

    pub fn node(&self, key: &str) -> Option<&FakeNode> {
        self.nodes.iter().find(|n| n.key == key)
    }

    pub fn node_mut(&mut self, key: &str) -> Option<&mut FakeNode> {
        self.nodes.iter_mut().find(|n| n.key == key)
    }

    pub fn value(&self, key: &str) -> String {
        self.node(key).map(|n| n.value.clone()).unwrap_or_default()
    }

    pub fn set_visible(&mut self, key: &str, visible: bool) {
        if let Some(node) = self.node_mut(key) {
            node.visible = visible;
        }
    }

    pub fn show(&mut self, key: &str) {
        self.set_visible(key, true);
    }

    pub fn hide(&mut self, key: &str) {
        self.set_visible(key, false);
    }

    pub fn remove(&mut self, key: &str) {
        self.nodes.retain(|n| n.key != key);
    }

    /// Run `f` on the first driver call at least `delay` from now.
    pub fn after(&mut self, delay: Duration, f: impl FnOnce(&mut FakePage) + Send + 'static) {
        self.timers.push((Instant::now() + delay, Box::new(f)));
    }

    fn tick(&mut self) {
        let now = Instant::now();
        loop {
            let due = self
                .timers
                .iter()
                .enumerate()
                .filter(|(_, (at, _))| *at <= now)
                .min_by_key(|(_, (at, _))| *at)
                .map(|(i, _)| i);
            let Some(i) = due else { break };
            let (_, f) = self.timers.remove(i);
            f(self);
        }
    }

    fn index(&self, key: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.key == key)
    }

    fn by_handle(&self, handle: &str) -> Option<&FakeNode> {
        self.nodes.iter().find(|n| n.handle() == handle)
    }

    fn effectively_visible(&self, node: &FakeNode) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if !n.visible {
                return false;
            }
            current = n.parent.as_deref().and_then(|p| self.node(p));
        }
        true
    }

    fn resolve(&self, locator: &Locator) -> Vec<usize> {
        let mut out: Vec<usize> = Vec::new();
        let push = |i: usize, out: &mut Vec<usize>| {
            if !out.contains(&i) {
                out.push(i);
            }
        };
        match locator {
            Locator::Id { id } => {
                for (i, n) in self.nodes.iter().enumerate() {
                    if n.id.as_deref() == Some(id.as_str()) {
                        push(i, &mut out);
                    }
                }
            }
            Locator::Css { selector } => {
                for (i, n) in self.nodes.iter().enumerate() {
                    if n.matches_css(selector) {
                        push(i, &mut out);
                    }
                }
            }
            Locator::Text { text, exact, scope } => {
                for (i, n) in self.nodes.iter().enumerate() {
                    let in_scope = scope.as_deref().map_or(true, |s| n.matches_css(s));
                    if in_scope && !n.text.is_empty() && text_matches(&n.text, text, *exact) {
                        push(i, &mut out);
                    }
                }
            }
            Locator::Closest { inner, ancestor } => {
                for i in self.resolve(inner) {
                    let mut current = Some(i);
                    while let Some(c) = current {
                        let node = &self.nodes[c];
                        if node.matches_css(ancestor) {
                            push(c, &mut out);
                            break;
                        }
                        current = node.parent.as_deref().and_then(|p| self.index(p));
                    }
                }
            }
            Locator::Any { parts } => {
                for part in parts {
                    for i in self.resolve(part) {
                        push(i, &mut out);
                    }
                }
            }
        }
        out
    }

    fn snapshot(&self, node: &FakeNode) -> Element {
        Element {
            handle: node.handle(),
            tag: node.tag.clone(),
            id: node.id.clone(),
            class_name: node.class_name.clone(),
            text: normalize(&node.text),
            visible: self.effectively_visible(node),
            enabled: node.enabled,
            readonly: node.readonly,
            input_type: node.input_type.clone(),
            in_label: node.in_label,
            bbox: node.bbox,
            device_pixel_ratio: 1.0,
        }
    }
}

struct Inner {
    page: FakePage,
    hooks: Vec<Hook>,
    events: Vec<Event>,
}

pub struct FakeDriver {
    inner: Mutex<Inner>,
}

impl FakeDriver {
    pub fn new(url: &str) -> Self {
        Self {
            inner: Mutex::new(Inner {
                page: FakePage {
                    url: url.into(),
                    nodes: Vec::new(),
                    timers: Vec::new(),
                },
                hooks: Vec::new(),
                events: Vec::new(),
            }),
        }
    }

    pub fn with(self, node: FakeNode) -> Self {
        self.lock().page.add(node);
        self
    }

    pub fn on(&self, hook: impl FnMut(&Event, &mut FakePage) + Send + 'static) {
        self.lock().hooks.push(Box::new(hook));
    }

    pub fn page<R>(&self, f: impl FnOnce(&mut FakePage) -> R) -> R {
        f(&mut self.lock().page)
    }

    pub fn after(&self, delay: Duration, f: impl FnOnce(&mut FakePage) + Send + 'static) {
        self.lock().page.after(delay, f);
    }

    pub fn events(&self) -> Vec<Event> {
        self.lock().events.clone()
    }

    pub fn clicks_on(&self, key: &str) -> usize {
        self.lock().events.iter().filter(|e| e.is_click_on(key)).count()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    fn emit(inner: &mut Inner, event: Event) {
        inner.events.push(event.clone());
        let mut hooks = std::mem::take(&mut inner.hooks);
        for hook in hooks.iter_mut() {
            hook(&event, &mut inner.page);
        }
        inner.hooks = hooks;
    }

    /// Key of the live node behind `element`.
    fn target(inner: &mut Inner, element: &Element, must_be_visible: bool) -> Result<String> {
        inner.page.tick();
        let node = inner
            .page
            .by_handle(&element.handle)
            .ok_or_else(|| Error::NotFound(format!("{} (detached)", element.describe())))?;
        if must_be_visible && !inner.page.effectively_visible(node) {
            return Err(Error::NotFound(format!(
                "{} (not interactable)",
                element.describe()
            )));
        }
        Ok(node.key.clone())
    }

    fn click_with(&self, element: &Element, how: Interaction, visible: bool) -> Result<()> {
        let mut inner = self.lock();
        let key = Self::target(&mut inner, element, visible)?;
        Self::emit(&mut inner, Event::Click { key, how });
        Ok(())
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn goto(&self, url: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.page.tick();
        inner.page.url = url.to_string();
        Self::emit(&mut inner, Event::Goto(url.to_string()));
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        let mut inner = self.lock();
        inner.page.tick();
        Ok(inner.page.url.clone())
    }

    async fn query(&self, locator: &Locator) -> Result<Vec<Element>> {
        let mut inner = self.lock();
        inner.page.tick();
        let page = &inner.page;
        Ok(page
            .resolve(locator)
            .into_iter()
            .map(|i| page.snapshot(&page.nodes[i]))
            .collect())
    }

    async fn click(&self, element: &Element) -> Result<()> {
        self.click_with(element, Interaction::Click, true)
    }

    async fn script_click(&self, element: &Element) -> Result<()> {
        self.click_with(element, Interaction::ScriptClick, false)
    }

    async fn click_parent(&self, element: &Element) -> Result<()> {
        self.click_with(element, Interaction::ParentClick, false)
    }

    async fn hover_click(&self, element: &Element) -> Result<()> {
        self.click_with(element, Interaction::HoverClick, true)
    }

    async fn clear(&self, element: &Element) -> Result<()> {
        let mut inner = self.lock();
        let key = Self::target(&mut inner, element, true)?;
        if let Some(node) = inner.page.node_mut(&key) {
            node.value.clear();
        }
        Self::emit(&mut inner, Event::Cleared(key));
        Ok(())
    }

    async fn type_text(&self, element: &Element, text: &str) -> Result<()> {
        let mut inner = self.lock();
        let key = Self::target(&mut inner, element, true)?;
        if let Some(node) = inner.page.node_mut(&key) {
            node.value.push_str(text);
        }
        Self::emit(
            &mut inner,
            Event::Typed {
                key,
                text: text.to_string(),
            },
        );
        Ok(())
    }

    async fn press_key(&self, element: &Element, key_name: &str) -> Result<()> {
        let mut inner = self.lock();
        let key = Self::target(&mut inner, element, true)?;
        Self::emit(
            &mut inner,
            Event::Key {
                key,
                name: key_name.to_string(),
            },
        );
        Ok(())
    }

    async fn scroll_into_view(&self, element: &Element) -> Result<()> {
        let mut inner = self.lock();
        let key = Self::target(&mut inner, element, false)?;
        Self::emit(&mut inner, Event::Scrolled(key));
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        Ok(png(200, 120))
    }
}

/// Solid PNG of the given size.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([240, 240, 240, 255]));
    let mut data = Vec::new();
    img.write_to(&mut Cursor::new(&mut data), image::ImageFormat::Png)
        .unwrap();
    data
}

/// Session provider handing out fresh fakes and counting lifecycle calls.
pub struct FakeProvider<F> {
    factory: F,
    acquired: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
    fail_acquire: bool,
}

impl<F> FakeProvider<F>
where
    F: Fn() -> FakeDriver + Send + Sync,
{
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            acquired: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicUsize::new(0)),
            fail_acquire: false,
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail_acquire = true;
        self
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<F> SessionProvider for FakeProvider<F>
where
    F: Fn() -> FakeDriver + Send + Sync,
{
    type Session = FakeDriver;

    async fn acquire(&self, _config: &BrowserConfig) -> Result<FakeDriver> {
        if self.fail_acquire {
            return Err(Error::Config("no browser available".into()));
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok((self.factory)())
    }

    async fn release(&self, _session: FakeDriver) -> Result<()> {
        self.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

const MAKES: &[&str] = &["HYUNDAI", "TOYOTA", "KIA"];
const MODELS: &[&str] = &["YARIS CROSS", "YARIS", "COROLLA"];

/// Scripted copy of the quote wizard.
///
/// Landing with plate input and quote button; a valid plate redirects to the
/// plans page after 1.5s, an empty one marks the input with the error class.
/// The plans page has a vehicle editor whose make/model fields open a search
/// dropdown, two plan buttons, and a continue button that appears once a plan
/// is chosen and redirects to the payment summary after 1s.
pub fn fake_wizard() -> FakeDriver {
    let mut driver = FakeDriver::new("about:blank")
        // landing
        .with(FakeNode::new("home", "div"))
        .with(
            FakeNode::input("plate")
                .id("plate")
                .class("form-control")
                .parent("home"),
        )
        .with(FakeNode::new("quote", "div").text("COTIZAR AHORA").parent("home"))
        .with(
            FakeNode::new("plate-error", "p")
                .text("Ingresa una placa válida")
                .parent("home")
                .hidden(),
        )
        // plans
        .with(FakeNode::new("plans", "div").hidden())
        .with(
            FakeNode::new("edit", "span")
                .text("Editar")
                .class("text-primary")
                .selector("span.text-primary")
                .parent("plans"),
        )
        .with(FakeNode::new("editor", "div").parent("plans").hidden())
        .with(FakeNode::input("make").id("make").readonly().parent("editor"))
        .with(FakeNode::input("model").id("model").readonly().parent("editor"))
        .with(FakeNode::new("save", "button").parent("editor"))
        .with(FakeNode::new("save-label", "span").text("Guardar cambios").parent("save"))
        .with(
            FakeNode::input("search")
                .selector("input[placeholder='buscar']")
                .hidden(),
        )
        .with(FakeNode::new("plan-1", "button").parent("plans"))
        .with(FakeNode::new("plan-1-label", "span").text("Seleccionar plan").parent("plan-1"))
        .with(FakeNode::new("plan-2", "button").parent("plans"))
        .with(FakeNode::new("plan-2-label", "span").text("Seleccionar plan").parent("plan-2"))
        .with(
            FakeNode::new("continue", "button")
                .text("CONTINUAR CON EL PAGO")
                .parent("plans")
                .hidden(),
        )
        // payment
        .with(FakeNode::new("payment", "div").hidden())
        .with(
            FakeNode::new("summary", "div")
                .class("rounded-lg shadow-md")
                .selector("div[class*='rounded']")
                .selector("div[class*='shadow']")
                .parent("payment"),
        )
        .with(FakeNode::new("summary-label", "p").text("Resumen de compra").parent("summary"));

    for (i, make) in MAKES.iter().enumerate() {
        driver = driver.with(FakeNode::new(&format!("opt-make-{}", i), "li").text(make).hidden());
    }
    for (i, model) in MODELS.iter().enumerate() {
        driver = driver.with(FakeNode::new(&format!("opt-model-{}", i), "li").text(model).hidden());
    }

    let mut open: Option<&'static str> = None;
    driver.on(move |event, page| match event {
        Event::Click { key, .. } if key == "quote" => {
            if page.value("plate").trim().is_empty() {
                if let Some(plate) = page.node_mut("plate") {
                    plate.class_name.push_str(" is-input-error");
                }
                page.show("plate-error");
            } else {
                page.after(Duration::from_millis(1500), |p| {
                    p.url = format!("{}cotizacion/planes", BASE_URL);
                    p.hide("home");
                    p.show("plans");
                });
            }
        }
        Event::Click { key, .. } if key == "edit" => {
            page.after(Duration::from_millis(300), |p| p.show("editor"));
        }
        Event::Click { key, .. } if key == "make" || key == "model" => {
            let group: &'static str = if key == "make" { "make" } else { "model" };
            open = Some(group);
            if let Some(search) = page.node_mut("search") {
                search.value.clear();
            }
            page.show("search");
            for i in 0..options(group).len() {
                page.show(&format!("opt-{}-{}", group, i));
            }
        }
        Event::Typed { key, .. } if key == "search" => {
            if let Some(group) = open {
                let filter = page.value("search");
                for (i, label) in options(group).iter().enumerate() {
                    page.set_visible(&format!("opt-{}-{}", group, i), text_matches(label, &filter, false));
                }
            }
        }
        Event::Click { key, .. } if key.starts_with("opt-") => {
            if let Some(group) = open.take() {
                let chosen = page.node(key).map(|n| n.text.clone()).unwrap_or_default();
                close_dropdown(page, group, chosen);
            }
        }
        Event::Key { key, name } if key == "search" && name == "Enter" => {
            if let Some(group) = open.take() {
                let typed = page.value("search");
                close_dropdown(page, group, typed);
            }
        }
        Event::Click { key, .. } if key == "save" => {
            page.after(Duration::from_millis(200), |p| p.hide("editor"));
        }
        Event::Click { key, .. } if key == "plan-1" || key == "plan-2" => {
            page.show("continue");
        }
        Event::Click { key, .. } if key == "continue" => {
            page.after(Duration::from_millis(1000), |p| {
                p.url = format!("{}cotizacion/pago", BASE_URL);
                p.hide("plans");
                p.show("payment");
            });
        }
        _ => {}
    });

    driver
}

fn options(group: &str) -> &'static [&'static str] {
    if group == "make" {
        MAKES
    } else {
        MODELS
    }
}

fn close_dropdown(page: &mut FakePage, group: &str, value: String) {
    if let Some(field) = page.node_mut(group) {
        field.value = value;
    }
    page.hide("search");
    for i in 0..options(group).len() {
        page.hide(&format!("opt-{}-{}", group, i));
    }
}
