//! Localized interface strings keyed by (text id, language).

use crate::domain::{Domain, DomainFilter};
use crate::language::Language;
use crate::tables::{TableFilter, TableName};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextId {
    Title,
    Subtitle,
    LanguageSelector,
    TableFilterLabel,
    DomainFilterLabel,
    ApiKeyHelp,
    ModelSelector,
    Temperature,
    ChatPlaceholder,
    ClearButton,
    ExamplesButton,
    ShowChart,
    ExitChat,
    WelcomeMessage,
    ApiKeyMissing,
    NoDataAvailable,
    MissingTablesNote,
    NoChart,
}

pub fn ui_text(id: TextId, language: Language) -> &'static str {
    use Language::{Ar, En};
    use TextId::*;

    match (id, language) {
        (Title, En) => "E-Invoice Chatbot",
        (Title, Ar) => "روبوت محادثة الفواتير الإلكترونية",
        (Subtitle, En) => "Ask questions about e-invoice data in English or Arabic",
        (Subtitle, Ar) => "اطرح أسئلة حول بيانات الفواتير الإلكترونية باللغة الإنجليزية أو العربية",
        (LanguageSelector, En) => "Select Language",
        (LanguageSelector, Ar) => "اختر اللغة",
        (TableFilterLabel, En) => "Filter by Table",
        (TableFilterLabel, Ar) => "تصفية حسب الجدول",
        (DomainFilterLabel, En) => "Filter by Domain",
        (DomainFilterLabel, Ar) => "تصفية حسب المجال",
        (ApiKeyHelp, En) => "Set OPENAI_API_KEY or pass --api-key to enable model answers",
        (ApiKeyHelp, Ar) => "اضبط OPENAI_API_KEY أو استخدم --api-key لتمكين إجابات النموذج",
        (ModelSelector, En) => "Model",
        (ModelSelector, Ar) => "النموذج",
        (Temperature, En) => "Response Creativity",
        (Temperature, Ar) => "إبداع الاستجابة",
        (ChatPlaceholder, En) => "Chat with the e-invoice assistant...",
        (ChatPlaceholder, Ar) => "تحدث مع مساعد الفواتير الإلكترونية...",
        (ClearButton, En) => "Clear Chat",
        (ClearButton, Ar) => "مسح المحادثة",
        (ExamplesButton, En) => "Show Examples",
        (ExamplesButton, Ar) => "عرض أمثلة",
        (ShowChart, En) => "Show Chart",
        (ShowChart, Ar) => "عرض الرسم البياني",
        (ExitChat, En) => "Exit",
        (ExitChat, Ar) => "خروج",
        (WelcomeMessage, En) => {
            "👋 Hello! I'm your e-invoice assistant. Ask me anything about the e-invoice data, tax compliance, or fraud detection."
        }
        (WelcomeMessage, Ar) => {
            "👋 مرحبًا! أنا مساعدك للفواتير الإلكترونية. اسألني أي شيء عن بيانات الفواتير الإلكترونية أو الامتثال الضريبي أو كشف الاحتيال."
        }
        (ApiKeyMissing, En) => {
            "⚠️ No OpenAI API key is configured. Answers are computed locally from the data."
        }
        (ApiKeyMissing, Ar) => {
            "⚠️ لم يتم تكوين مفتاح API لـ OpenAI. يتم حساب الإجابات محليًا من البيانات."
        }
        (NoDataAvailable, En) => "No data is available to answer this question.",
        (NoDataAvailable, Ar) => "لا تتوفر بيانات للإجابة على هذا السؤال.",
        (MissingTablesNote, En) => "Note: the following data was not available:",
        (MissingTablesNote, Ar) => "ملاحظة: البيانات التالية غير متوفرة:",
        (NoChart, En) => "No chart is available for this question.",
        (NoChart, Ar) => "لا يوجد رسم بياني متاح لهذا السؤال.",
    }
}

/// Chat commands with their localized labels, in help order.
pub fn chat_commands(language: Language) -> Vec<(&'static str, &'static str)> {
    [
        ("/lang <en|ar>", TextId::LanguageSelector),
        ("/table <name|all>", TextId::TableFilterLabel),
        ("/domain <name|all>", TextId::DomainFilterLabel),
        ("/examples", TextId::ExamplesButton),
        ("/chart", TextId::ShowChart),
        ("/clear", TextId::ClearButton),
        ("/quit", TextId::ExitChat),
    ]
    .into_iter()
    .map(|(command, id)| (command, ui_text(id, language)))
    .collect()
}

pub fn table_display_name(table: TableName, language: Language) -> &'static str {
    match (table, language) {
        (TableName::Invoices, Language::En) => "Invoices",
        (TableName::Invoices, Language::Ar) => "الفواتير",
        (TableName::Items, Language::En) => "Items",
        (TableName::Items, Language::Ar) => "العناصر",
        (TableName::Taxpayers, Language::En) => "Taxpayers",
        (TableName::Taxpayers, Language::Ar) => "دافعي الضرائب",
        (TableName::AuditLogs, Language::En) => "Audit Logs",
        (TableName::AuditLogs, Language::Ar) => "سجلات التدقيق",
    }
}

pub fn table_filter_display_name(filter: TableFilter, language: Language) -> &'static str {
    match (filter, language) {
        (TableFilter::All, Language::En) => "All Tables",
        (TableFilter::All, Language::Ar) => "جميع الجداول",
        (TableFilter::Only(table), _) => table_display_name(table, language),
    }
}

pub fn domain_display_name(domain: Domain, language: Language) -> &'static str {
    match (domain, language) {
        (Domain::TaxCompliance, Language::En) => "Tax Compliance",
        (Domain::TaxCompliance, Language::Ar) => "الامتثال الضريبي",
        (Domain::FraudDetection, Language::En) => "Fraud Detection",
        (Domain::FraudDetection, Language::Ar) => "كشف الاحتيال",
        (Domain::RevenueAnalysis, Language::En) => "Revenue Analysis",
        (Domain::RevenueAnalysis, Language::Ar) => "تحليل الإيرادات",
        (Domain::GeographicDistribution, Language::En) => "Geographic Distribution",
        (Domain::GeographicDistribution, Language::Ar) => "التوزيع الجغرافي",
    }
}

pub fn domain_filter_display_name(filter: DomainFilter, language: Language) -> &'static str {
    match (filter, language) {
        (DomainFilter::All, Language::En) => "All Domains",
        (DomainFilter::All, Language::Ar) => "جميع المجالات",
        (DomainFilter::Only(domain), _) => domain_display_name(domain, language),
    }
}

pub fn example_questions(language: Language) -> &'static [&'static str] {
    match language {
        Language::En => &[
            "What is the total VAT collected in Dubai?",
            "Show me the distribution of invoices by emirate",
            "What are the most common anomaly types in invoices?",
            "Compare tax compliance rates across different sectors",
            "Show me the monthly revenue trend over the past year",
        ],
        Language::Ar => &[
            "ما هو إجمالي ضريبة القيمة المضافة المحصلة في دبي؟",
            "أظهر لي توزيع الفواتير حسب الإمارة",
            "ما هي أنواع الشذوذ الأكثر شيوعًا في الفواتير؟",
            "قارن بين معدلات الامتثال الضريبي عبر القطاعات المختلفة",
            "أظهر لي اتجاه الإيرادات الشهرية على مدار العام الماضي",
        ],
    }
}
