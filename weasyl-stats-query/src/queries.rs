//! SQL text of the fixed aggregate queries
//!
//! Each constant is run as-is against the backing store; the registry maps
//! the public query name to it.

pub const REPORTS_BY_DAY: &str = "
    SELECT *
    FROM
        (SELECT
             date_trunc('day', to_timestamp(unixtime)) AS day,
             count(*) count
         FROM report
         GROUP BY day) subq
    WHERE day >= '2012-10-01'::timestamp
";

pub const SUBMISSIONS_BY_DAY_AND_RATING: &str = "
    SELECT *
    FROM
        (SELECT
             date_trunc('day', to_timestamp(unixtime)) AS day,
             rating,
             count(*) count
         FROM submission
         GROUP BY day, rating) subq
    WHERE day >= '2012-10-01'::timestamp
";

pub const SUBMISSIONS_BY_DAY_AND_TYPE: &str = "
    SELECT *
    FROM
        (SELECT
             date_trunc('day', to_timestamp(unixtime)) AS day,
             subtype / 1000 typ,
             count(*) count
         FROM submission
         GROUP BY day, typ) subq
    WHERE day >= '2012-10-01'::timestamp
";

pub const USERS_BY_DAY: &str = "
    SELECT *
    FROM
        (SELECT
             date_trunc('day', to_timestamp(unixtime)) AS day,
             count(*) count
         FROM profile
         GROUP BY day) subq
    WHERE day >= '2012-10-01'::timestamp
    ORDER BY day ASC
";

pub const MAIN_GENDERS: &str = "
    WITH genders
         AS (SELECT CASE
                      WHEN lower(gender) IN ('male', 'female') THEN lower(gender)
                      ELSE 'other'
                    END gender
             FROM   userinfo
             WHERE  gender != '')
    SELECT gender,
           count(*)
    FROM   genders
    GROUP  BY gender
";

pub const OTHER_GENDERS: &str = "
    WITH genders
         AS (SELECT lower(gender) gender
             FROM   userinfo
             WHERE  lower(gender) NOT IN ('male', 'female', ''))
    SELECT gender,
           count(*)
    FROM   genders
    GROUP  BY gender
    ORDER  BY count(*) DESC
    LIMIT  25
";

pub const GENDERS: &str = "
    SELECT lower(gender), COUNT(*)
      FROM userinfo
     WHERE gender != ''
     GROUP BY lower(gender)
     ORDER BY COUNT(*) DESC
     LIMIT 25
";

pub const AGES: &str = "
    WITH ages AS (
        SELECT date_trunc('year', age(to_timestamp(birthday))) age, COUNT(*)
          FROM userinfo
         GROUP BY age
         ORDER BY age ASC
    ) SELECT * FROM ages WHERE age > '0 minutes'
";

pub const TICKETS: &str = "
    SELECT CASE
             WHEN report.settings = 'r'
                   OR login_name IS NULL THEN 'open-ticket'
             ELSE login_name
           END                                         reporter,
           date_trunc('month', to_timestamp(unixtime)) opened_at,
           count(*)                                    count
    FROM   report
           LEFT JOIN login
                  ON report.closerid = login.userid
    GROUP  BY opened_at,
              reporter
";

pub const TAG_COUNTS: &str = "
    WITH n_tags
         AS (SELECT count(*) n_tags
             FROM   searchmapsubmit
             GROUP  BY targetid)
    SELECT n_tags,
           count(*)
    FROM   n_tags
    GROUP  BY n_tags
";

pub const TAG_POPULARITY: &str = "
    SELECT title,
           count(*)
    FROM   searchmapsubmit
           JOIN searchtag USING (tagid)
    GROUP  BY title
    ORDER  BY count(*) DESC
    LIMIT  25
";

pub const TAG_FAVORITES: &str = "
    WITH fave_counts
         AS (SELECT targetid submitid,
                    count(*) favorites
             FROM   favorite
             WHERE  type = 's'
             GROUP  BY targetid)
    SELECT searchtag.title,
           sum(favorites)
    FROM   searchmapsubmit
           JOIN searchtag using (tagid)
           JOIN submission
             ON targetid = submitid
           JOIN fave_counts using (submitid)
    GROUP  BY searchtag.title
    ORDER  BY sum(favorites) DESC
    LIMIT  25
";

pub const OTHER_RATING_STATISTICS: &str = "
    WITH fave_counts
         AS (SELECT targetid submitid,
                    count(*) favorites
             FROM   favorite
             WHERE  type = 's'
             GROUP  BY targetid)
    SELECT rating,
           sum(page_views),
           sum(favorites),
           sum(page_views::float) / count(*),
           sum(favorites) / count(*),
           sum(favorites) / sum(page_views)
    FROM   submission
           JOIN fave_counts using (submitid)
    GROUP  BY rating
";

pub const TAG_POPULARITY_FAVORITES: &str = "
    WITH fave_counts
         AS (SELECT targetid submitid,
                    count(*) favorites
             FROM   favorite
             WHERE  type = 's'
             GROUP  BY targetid)
    SELECT searchtag.title,
           count(*),
           sum(favorites)
    FROM   searchmapsubmit
           JOIN searchtag using (tagid)
           JOIN submission
             ON targetid = submitid
           JOIN fave_counts using (submitid)
    GROUP  BY searchtag.title
    ORDER  BY count(*) DESC
    LIMIT  100
";

pub const TAG_INTEREST: &str = "
    WITH fave_counts
         AS (SELECT targetid submitid,
                    count(*) favorites
             FROM   favorite
             WHERE  type = 's'
             GROUP  BY targetid),
         avg_faves
         AS (SELECT sum(favorites) / count(*) avg_faves
             FROM   fave_counts),
         total_submissions
         AS (SELECT count(*) total_submissions
             FROM   submission)
    SELECT searchtag.title,
           count(*)::float / total_submissions,
           sum(( favorites > avg_faves )::int::float) / count(*)
    FROM   avg_faves,
           total_submissions,
           searchmapsubmit
           JOIN searchtag using (tagid)
           JOIN submission
             ON targetid = submitid
           JOIN fave_counts using (submitid)
    GROUP  BY searchtag.title,
              total_submissions
    ORDER  BY count(*) DESC
    LIMIT  100
";

pub const SUBMISSION_PCT_VIEWS_FAVORITES_COMMENTS_SUBMISSIONS_BY_RATING: &str = "
    WITH favorites
         AS (SELECT targetid submitid,
                    count(*) favorites
             FROM   favorite
             WHERE  type = 's'
             GROUP  BY targetid),
         comments
         AS (SELECT target_sub submitid,
                    count(*)   AS comments
             FROM   comments
             WHERE  target_sub IS NOT NULL
             GROUP  BY target_sub),
         totals
         AS (SELECT sum(page_views) all_page_views,
                    sum(favorites)  all_favorites,
                    sum(comments)   all_comments,
                    count(*)        AS all_submissions
             FROM   submission
                    JOIN favorites using (submitid)
                    JOIN comments using (submitid))
    SELECT rating,
           sum(page_views)::float / all_page_views,
           sum(favorites)::float / all_favorites,
           sum(comments)::float / all_comments,
           count(*)::float / all_submissions
    FROM   totals,
           submission
           JOIN favorites using (submitid)
           JOIN comments using (submitid)
    GROUP  BY rating,
              all_page_views,
              all_favorites,
              all_comments,
              all_submissions
";

pub const FOLLOWS_VS_SUBMISSIONS: &str = "
    WITH follows
         AS (SELECT otherid  userid,
                    count(*) follows
             FROM   watchuser
             GROUP  BY otherid),
         submissions
         AS (SELECT userid,
                    count(*) submissions
             FROM   submission
             GROUP  BY userid)
    SELECT username,
           submissions,
           follows,
           CASE
             WHEN submissions > follows THEN submissions::float / max_submissions
             ELSE follows::float / max_follows
           END score
    FROM   (SELECT max(submissions) max_submissions
            FROM   submissions) subq1,
           (SELECT max(follows) max_follows
            FROM   follows) subq2,
           follows
           JOIN submissions using (userid)
           JOIN profile using (userid)
    ORDER  BY score DESC
    LIMIT  250
";

pub const FOLLOWS_VS_SUBMISSIONS_CLUSTERED: &str = "
    WITH follows
         AS (SELECT otherid  userid,
                    count(*) follows
             FROM   watchuser
             GROUP  BY otherid),
         submissions
         AS (SELECT userid,
                    count(*) submissions
             FROM   submission
             GROUP  BY userid)
    SELECT min(COALESCE(submissions, 0)),
           min(COALESCE(follows, 0)),
           count(*)
    FROM   login
           LEFT JOIN follows using (userid)
           LEFT JOIN submissions using (userid)
    GROUP  BY COALESCE(submissions, 0) / 40,
              COALESCE(follows, 0) / 100
    ORDER  BY count(*) DESC
";

/// Every named aggregate, in registration order.
pub const STORE_QUERIES: &[(&str, &str)] = &[
    ("reports_by_day", REPORTS_BY_DAY),
    (
        "submissions_by_day_and_rating",
        SUBMISSIONS_BY_DAY_AND_RATING,
    ),
    ("submissions_by_day_and_type", SUBMISSIONS_BY_DAY_AND_TYPE),
    ("users_by_day", USERS_BY_DAY),
    ("main_genders", MAIN_GENDERS),
    ("other_genders", OTHER_GENDERS),
    ("genders", GENDERS),
    ("ages", AGES),
    ("tickets", TICKETS),
    ("tag_counts", TAG_COUNTS),
    ("tag_popularity", TAG_POPULARITY),
    ("tag_favorites", TAG_FAVORITES),
    ("other_rating_statistics", OTHER_RATING_STATISTICS),
    ("tag_popularity_favorites", TAG_POPULARITY_FAVORITES),
    ("tag_interest", TAG_INTEREST),
    (
        "submission_pct_views_favorites_comments_submissions_by_rating",
        SUBMISSION_PCT_VIEWS_FAVORITES_COMMENTS_SUBMISSIONS_BY_RATING,
    ),
    ("follows_vs_submissions", FOLLOWS_VS_SUBMISSIONS),
    (
        "follows_vs_submissions_clustered",
        FOLLOWS_VS_SUBMISSIONS_CLUSTERED,
    ),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_query_names_are_unique() {
        let names: HashSet<&str> = STORE_QUERIES.iter().map(|(name, _)| *name).collect();
        assert_eq!(names.len(), STORE_QUERIES.len());
        assert_eq!(STORE_QUERIES.len(), 18);
    }

    #[test]
    fn test_queries_are_read_only() {
        for (name, sql) in STORE_QUERIES {
            let upper = sql.to_uppercase();
            assert!(upper.contains("SELECT"), "{} has no SELECT", name);
            for keyword in ["INSERT ", "UPDATE ", "DELETE ", "DROP "] {
                assert!(!upper.contains(keyword), "{} contains {}", name, keyword);
            }
        }
    }
}
