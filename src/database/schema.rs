diesel::table! {
    team_members (id) {
        id -> Integer,
        name -> Text,
        email -> Text,
        github_username -> Nullable<Text>,
        jira_username -> Nullable<Text>,
        created_at -> Nullable<Timestamp>,
    }
}

diesel::table! {
    digest_records (id) {
        id -> Integer,
        digest_date -> Date,
        team_name -> Text,
        summary_text -> Nullable<Text>,
        sent_at -> Nullable<Timestamp>,
        success -> Nullable<Bool>,
    }
}

diesel::table! {
    github_activities (id) {
        id -> Integer,
        digest_id -> Integer,
        pr_count -> Nullable<Integer>,
        commit_count -> Nullable<Integer>,
        activity_data -> Nullable<Text>,
        collected_at -> Nullable<Timestamp>,
    }
}

diesel::table! {
    jira_activities (id) {
        id -> Integer,
        digest_id -> Integer,
        ticket_count -> Nullable<Integer>,
        completed_count -> Nullable<Integer>,
        activity_data -> Nullable<Text>,
        collected_at -> Nullable<Timestamp>,
    }
}

diesel::table! {
    scrum_meetings (id) {
        id -> Integer,
        meeting_date -> Timestamp,
        team_name -> Text,
        attendance_count -> Nullable<Integer>,
        notes -> Nullable<Text>,
        created_at -> Nullable<Timestamp>,
    }
}

diesel::joinable!(github_activities -> digest_records (digest_id));
diesel::joinable!(jira_activities -> digest_records (digest_id));

diesel::allow_tables_to_appear_in_same_query!(
    team_members,
    digest_records,
    github_activities,
    jira_activities,
    scrum_meetings,
);
