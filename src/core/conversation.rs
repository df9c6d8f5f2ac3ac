// 對話紀錄只能經由 reduce 產生新版本，ChatSession 是唯一的寫入者

use crate::core::ranker::RankView;
use crate::domain::model::{
    Confidence, IdentificationResult, IdentifiedProduct, IdentifyRequest, Message, Product,
    Retailer, Role,
};
use crate::domain::ports::ProductIdentifier;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

pub const GREETING: &str = "Hello! I can help you find medicines and healthcare products. You can describe what you're looking for or upload a photo of the product.";

pub const DEFAULT_IMAGE_PROMPT: &str = "Identify this product";

pub const ERROR_REPLY: &str = "I'm sorry, I encountered an error while trying to identify the product. Please try again.";

const VERIFY_REMINDER: &str = "Please verify the details before purchasing.";

const PLACEHOLDER_URL: &str = "#";

/// 與瀏覽器 `encodeURIComponent` 相同：英數字與 `-_.!~*'()` 不編碼
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    messages: Arc<[Message]>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self {
            messages: Arc::from(Vec::new()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ConversationEvent {
    MessageAppended(Message),
}

/// `(log, event) -> log'`
pub fn reduce(log: &Conversation, event: ConversationEvent) -> Conversation {
    match event {
        ConversationEvent::MessageAppended(message) => {
            let mut messages = Vec::with_capacity(log.messages.len() + 1);
            messages.extend(log.messages.iter().cloned());
            messages.push(message);
            Conversation {
                messages: messages.into(),
            }
        }
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_greeting() -> Self {
        Self::new().append(Message::assistant(GREETING, None))
    }

    pub fn append(&self, message: Message) -> Self {
        reduce(self, ConversationEvent::MessageAppended(message))
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Answered,
    /// 辨識失敗，已附加道歉訊息
    Failed,
    /// 已有請求進行中，或沒有文字也沒有圖片，本次送出被忽略
    Ignored,
}

pub struct ChatSession<I: ProductIdentifier> {
    identifier: I,
    log: RwLock<Conversation>,
    processing: AtomicBool,
}

/// 離開作用域時一定會清除 processing 旗標
struct ProcessingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> ProcessingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl<I: ProductIdentifier> ChatSession<I> {
    pub fn new(identifier: I) -> Self {
        Self::with_conversation(identifier, Conversation::with_greeting())
    }

    pub fn with_conversation(identifier: I, conversation: Conversation) -> Self {
        Self {
            identifier,
            log: RwLock::new(conversation),
            processing: AtomicBool::new(false),
        }
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    /// 目前對話的快照
    pub fn conversation(&self) -> Conversation {
        match self.log.read() {
            Ok(log) => log.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn dispatch(&self, event: ConversationEvent) {
        let mut log = match self.log.write() {
            Ok(log) => log,
            Err(poisoned) => poisoned.into_inner(),
        };
        *log = reduce(&log, event);
    }

    pub async fn send_turn(&self, content: &str, image: Option<String>) -> TurnOutcome {
        if content.trim().is_empty() && image.is_none() {
            tracing::debug!("Turn ignored: nothing to identify");
            return TurnOutcome::Ignored;
        }

        let Some(_guard) = ProcessingGuard::acquire(&self.processing) else {
            tracing::debug!("Turn ignored: identification already in progress");
            return TurnOutcome::Ignored;
        };

        let content = if content.trim().is_empty() && image.is_some() {
            DEFAULT_IMAGE_PROMPT.to_string()
        } else {
            content.to_string()
        };

        self.dispatch(ConversationEvent::MessageAppended(Message::user(
            content.clone(),
            image.clone(),
        )));

        let request = IdentifyRequest::new(Some(content), image);
        let (reply, outcome) = match self.identifier.identify(&request).await {
            Ok(result) => (assistant_reply(&result), TurnOutcome::Answered),
            Err(e) => {
                tracing::error!("❌ Failed to identify product: {}", e);
                (Message::assistant(ERROR_REPLY, None), TurnOutcome::Failed)
            }
        };

        self.dispatch(ConversationEvent::MessageAppended(reply));
        outcome
    }
}

/// 把辨識結果轉成助理訊息
pub fn assistant_reply(result: &IdentificationResult) -> Message {
    let count = result.products.len();
    let content = if result.confidence == Confidence::High {
        format!(
            "I found {} product{} matching your search. {}",
            count,
            if count > 1 { "s" } else { "" },
            result.notes.as_deref().unwrap_or("")
        )
        .trim_end()
        .to_string()
    } else {
        format!(
            "Here are some products that might match your search. {}",
            result.notes.as_deref().unwrap_or(VERIFY_REMINDER)
        )
    };

    let batch = chrono::Utc::now().timestamp_millis();
    let products = result
        .products
        .iter()
        .enumerate()
        .map(|(index, product)| display_product(product, batch, index))
        .collect();

    Message::assistant(content, Some(products))
}

fn display_product(product: &IdentifiedProduct, batch: i64, index: usize) -> Product {
    let encoded_name = utf8_percent_encode(&product.name, QUERY_COMPONENT).to_string();

    Product {
        id: format!("product-{}-{}", batch, index),
        name: product.name.clone(),
        description: product.description.clone(),
        image_ref: format!(
            "/placeholder.svg?height=200&width=200&query={}",
            encoded_name
        ),
        retailers: product
            .retailers
            .iter()
            .map(|offer| Retailer {
                name: offer.name.clone(),
                price: offer.price,
                availability: offer.availability,
                rating: offer.rating,
                shipping_time: offer.shipping_time.clone(),
                url: PLACEHOLDER_URL.to_string(),
            })
            .collect(),
    }
}

/// 純文字對話紀錄，依插入順序輸出；每個產品的零售商依 `view` 排序篩選
pub fn render_transcript(conversation: &Conversation, view: &RankView) -> String {
    let mut out = String::new();

    for message in conversation.messages() {
        let speaker = match message.role {
            Role::User => "You",
            Role::Assistant => "Assistant",
        };
        let _ = writeln!(out, "{}: {}", speaker, message.content);

        if message.image.is_some() {
            let _ = writeln!(out, "  [image attached]");
        }

        for product in message.results.iter().flatten() {
            let _ = writeln!(out, "  ■ {}", product.name);
            let _ = writeln!(out, "    {}", product.description);

            let retailers = view.apply(&product.retailers);
            if retailers.is_empty() {
                let _ = writeln!(out, "    (no retailers match filter: {})", view.filter);
            }
            for retailer in retailers {
                let _ = write!(
                    out,
                    "    - {:<18} ${:>7.2}  {}",
                    retailer.name,
                    retailer.price,
                    retailer.availability.label()
                );
                if let Some(rating) = retailer.rating {
                    let _ = write!(out, "  ★ {:.1}", rating);
                }
                if let Some(shipping) = &retailer.shipping_time {
                    let _ = write!(out, "  🚚 {}", shipping);
                }
                let _ = writeln!(out);
            }
        }
    }

    out
}
