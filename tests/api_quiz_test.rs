//! Integration tests for the quiz API endpoints

mod test_utils;

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::json;
    use serial_test::serial;
    use tower::util::ServiceExt;

    use crate::test_utils::{body_to_json, test_app, test_app_with_host};

    fn post(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn questions() -> serde_json::Value {
        json!([
            {
                "type": "mcq",
                "question": "Où siège la CIJ ?",
                "options": ["Genève", "La Haye", "New York"],
                "correctAnswerIndex": 1,
                "explanation": "Au Palais de la Paix."
            },
            {
                "type": "truefalse",
                "question": "La compétence de la CIJ est obligatoire.",
                "options": ["Vrai", "Faux"],
                "correctAnswerIndex": 1,
                "explanation": "Elle repose sur le consentement des États."
            },
            {
                "type": "case",
                "question": "Un maire exproprie un investisseur étranger. Qui est responsable ?",
                "correctAnswer": "L'État, du fait de ses organes.",
                "explanation": "Responsabilité internationale de l'État."
            }
        ])
    }

    #[tokio::test]
    #[serial]
    async fn it_scores_a_quiz() {
        let app = test_app().await;

        let response = app
            .oneshot(post(
                "/api/quiz/score",
                json!({"questions": questions(), "answers": [1, 0, {"correct": true}]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_to_json(response.into_body()).await;
        assert_eq!(body["correct"], 2);
        assert_eq!(body["total"], 3);
        assert_eq!(body["results"], json!([true, false, true]));
        assert_eq!(body["feedback"], "Bon travail !");
    }

    #[tokio::test]
    #[serial]
    async fn it_rejects_a_score_with_missing_answers() {
        let app = test_app().await;

        let response = app
            .oneshot(post(
                "/api/quiz/score",
                json!({"questions": questions(), "answers": [1]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    /// A choice index given for a case study can't be scored
    #[tokio::test]
    #[serial]
    async fn it_rejects_mismatched_answers() {
        let app = test_app().await;

        let response = app
            .oneshot(post(
                "/api/quiz/score",
                json!({"questions": questions(), "answers": [1, 1, 0]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    #[serial]
    async fn it_grades_a_case_study() {
        let mut server = mockito::Server::new_async().await;
        let reply = r#"```json
{"correct": true, "feedback": "Bonne identification de l'attribution."}
```"#;
        let mock = server
            .mock("POST", "/v1beta/models/gemini-test:generateContent")
            .match_body(mockito::Matcher::Regex("ses organes".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({"candidates": [{"content": {"role": "model", "parts": [{"text": reply}]}}]})
                    .to_string(),
            )
            .create();
        let app = test_app_with_host(&server.url()).await;

        let response = app
            .oneshot(post(
                "/api/quiz/grade",
                json!({"question": questions()[2], "answer": "L'État répond des actes du maire."}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        mock.assert();

        let body = body_to_json(response.into_body()).await;
        assert_eq!(body["correct"], true);
        assert_eq!(body["feedback"], "Bonne identification de l'attribution.");
    }

    #[tokio::test]
    #[serial]
    async fn it_only_grades_case_studies() {
        let app = test_app().await;

        let response = app
            .clone()
            .oneshot(post(
                "/api/quiz/grade",
                json!({"question": questions()[0], "answer": "La Haye"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(post(
                "/api/quiz/grade",
                json!({"question": questions()[2], "answer": " "}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
