//! Demo inbox used when no mailbox is connected.

use chrono::{Duration, Utc};

use super::RawEmail;

/// Five representative support emails, received between 30 minutes and
/// 8 hours ago.
pub fn sample_inbox() -> Vec<RawEmail> {
    let now = Utc::now();
    let stamp = now.timestamp_millis();
    let sample = |n: u8, from: &str, subject: &str, body: &str, age: Duration| RawEmail {
        message_id: Some(format!("sample-{stamp}-{n}")),
        from: from.to_owned(),
        subject: subject.to_owned(),
        body: body.to_owned(),
        date: now.checked_sub_signed(age),
        attachments: Vec::new(),
    };

    vec![
        sample(
            1,
            "john.doe@customer.com",
            "Urgent: Cannot access my account",
            "Hi Support Team,\n\n\
             I'm having trouble logging into my account. I've tried multiple times but keep \
             getting an error message saying \"Invalid credentials\" even though I'm sure my \
             password is correct.\n\n\
             This is urgent as I need to access my billing information immediately for a client \
             meeting tomorrow morning. I've been a customer for over 2 years and this has never \
             happened before.\n\n\
             My phone number is 555-123-4567 if you need to call me directly. Please help me \
             resolve this as soon as possible.\n\n\
             Best regards,\nJohn Doe",
            Duration::hours(2),
        ),
        sample(
            2,
            "sarah.wilson@company.com",
            "Help with API integration",
            "Hello,\n\n\
             I'm trying to integrate your API into our system but I'm having some issues with \
             authentication. The documentation mentions OAuth 2.0 but I'm not getting the \
             expected response when I make the token request.\n\n\
             Could you please provide some guidance on the proper authentication flow? Our \
             development team email is dev@company.com if you need to send any technical \
             documentation.\n\n\
             We're planning to go live next week, so any assistance would be greatly \
             appreciated.\n\n\
             Thanks,\nSarah Wilson\nLead Developer",
            Duration::hours(4),
        ),
        sample(
            3,
            "mike.johnson@startup.io",
            "Thank you for the great support!",
            "Hi there,\n\n\
             I wanted to take a moment to thank your support team for the excellent help I \
             received yesterday. The issue with our webhook integration was resolved quickly and \
             professionally.\n\n\
             Your customer service is outstanding and it's one of the reasons we chose your \
             platform. Keep up the great work!\n\n\
             Best regards,\nMike Johnson\nCTO, StartupIO",
            Duration::hours(6),
        ),
        sample(
            4,
            "lisa.chen@enterprise.com",
            "Critical: System down for production",
            "URGENT - PRODUCTION DOWN\n\n\
             Our production system is completely down and we cannot access any of your \
             services. This is affecting our entire operation and we're losing money every \
             minute this continues.\n\n\
             Error message: \"Service Unavailable - 503\"\n\
             Started: About 30 minutes ago\n\
             Affected systems: All API endpoints\n\n\
             Please escalate this immediately! Contact me at 555-987-6543 or \
             lisa.chen@enterprise.com\n\n\
             This is a critical business impact situation.\n\n\
             Lisa Chen\nOperations Manager\nEnterprise Corp",
            Duration::minutes(30),
        ),
        sample(
            5,
            "david.brown@client.org",
            "Query about subscription pricing",
            "Hi,\n\n\
             I'm interested in upgrading our subscription plan. We're currently on the Basic \
             plan but we're hitting the API rate limits more frequently as our usage grows.\n\n\
             Could you provide information about:\n\
             1. Enterprise pricing and features\n\
             2. Custom API rate limits\n\
             3. Priority support options\n\
             4. Migration process from Basic to Enterprise\n\n\
             We process about 50,000 API calls per month and expect this to double in the next \
             quarter.\n\n\
             Please let me know the best time to schedule a call to discuss our needs.\n\n\
             Thanks,\nDavid Brown\nIT Director",
            Duration::hours(8),
        ),
    ]
}
